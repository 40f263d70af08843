//! Per-session authorization record.
//!
//! The textual form is positional and colon delimited:
//! `privileges:directory:max_upload_size:recursive:permanence`, e.g.
//! `rw:/srv/uploads/:1048576:w:p`. Key-store comments carry the first
//! four fields only.

use std::fmt::{Display, Formatter};

use crate::PermissionParseError;

const PERMISSION_FIELDS: usize = 5;
const KEY_COMMENT_FIELDS: usize = 4;

/// A subset of {read, write}.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Access {
    pub read: bool,
    pub write: bool,
}

impl Access {
    pub const NONE: Access = Access {
        read: false,
        write: false,
    };
    pub const READ: Access = Access {
        read: true,
        write: false,
    };
    pub const WRITE: Access = Access {
        read: false,
        write: true,
    };
    pub const READ_WRITE: Access = Access {
        read: true,
        write: true,
    };

    pub fn parse(value: &str) -> Result<Self, PermissionParseError> {
        let mut access = Access::NONE;
        for c in value.chars() {
            match c {
                'r' => access.read = true,
                'w' => access.write = true,
                _ => return Err(PermissionParseError::InvalidAccess(value.to_owned())),
            }
        }
        Ok(access)
    }
}

impl Display for Access {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.read {
            write!(f, "r")?;
        }
        if self.write {
            write!(f, "w")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permission {
    /// Whether the session may download (`read`) and upload (`write`) at all.
    pub privileges: Access,
    pub recursive: Access,
    /// Absolute and `/`-terminated, or empty for the shared root.
    pub directory: String,
    /// Bytes, `0` is unlimited.
    pub max_upload_size: u64,
    /// Single-use credential.
    pub temporary: bool,
}

impl Permission {
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.privileges,
            self.directory,
            self.max_upload_size,
            self.recursive,
            if self.temporary { "t" } else { "p" },
        )
    }

    /// Comment form used in key-store files.
    pub fn encode_key_comment(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.privileges, self.directory, self.max_upload_size, self.recursive,
        )
    }

    pub fn decode(value: &str) -> Result<Self, PermissionParseError> {
        let fields = value.split(':').collect::<Vec<_>>();
        Self::from_fields(&fields)
    }

    pub fn decode_key_comment(value: &str) -> Result<Self, PermissionParseError> {
        let fields = value.split(':').collect::<Vec<_>>();
        if fields.len() != KEY_COMMENT_FIELDS {
            return Err(PermissionParseError::FieldCount {
                expected: KEY_COMMENT_FIELDS,
                found: fields.len(),
            });
        }
        Self::parse_common(&fields, false)
    }

    /// Parses the five permission fields of an already split record.
    pub fn from_fields(fields: &[&str]) -> Result<Self, PermissionParseError> {
        if fields.len() != PERMISSION_FIELDS {
            return Err(PermissionParseError::FieldCount {
                expected: PERMISSION_FIELDS,
                found: fields.len(),
            });
        }
        let temporary = match fields[4] {
            "t" => true,
            "p" => false,
            other => return Err(PermissionParseError::InvalidPermanence(other.to_owned())),
        };
        Self::parse_common(fields, temporary)
    }

    fn parse_common(fields: &[&str], temporary: bool) -> Result<Self, PermissionParseError> {
        Ok(Permission {
            privileges: Access::parse(fields[0])?,
            directory: normalize_directory(fields[1])?,
            max_upload_size: fields[2].parse()?,
            recursive: Access::parse(fields[3])?,
            temporary,
        })
    }
}

/// Ensures a non-empty directory is absolute and ends with `/`.
pub fn normalize_directory(directory: &str) -> Result<String, PermissionParseError> {
    if directory.is_empty() {
        return Ok(String::new());
    }
    if !directory.starts_with('/') {
        return Err(PermissionParseError::RelativeDirectory(directory.to_owned()));
    }
    Ok(with_trailing_separator(directory))
}

pub fn with_trailing_separator(path: &str) -> String {
    if path.ends_with('/') {
        path.to_owned()
    } else {
        format!("{path}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let permission = Permission {
            privileges: Access::READ_WRITE,
            recursive: Access::WRITE,
            directory: "/srv/uploads/".into(),
            max_upload_size: 1024,
            temporary: true,
        };
        assert_eq!(permission.encode(), "rw:/srv/uploads/:1024:w:t");
        assert_eq!(permission.encode_key_comment(), "rw:/srv/uploads/:1024:w");
    }

    #[test]
    fn test_round_trip() {
        let permissions = [
            Permission::default(),
            Permission {
                privileges: Access::READ,
                recursive: Access::READ_WRITE,
                directory: "/".into(),
                max_upload_size: u64::MAX,
                temporary: false,
            },
            Permission {
                privileges: Access::WRITE,
                recursive: Access::NONE,
                directory: "/home/scp/alice/".into(),
                max_upload_size: 0,
                temporary: true,
            },
        ];
        for permission in permissions {
            assert_eq!(Permission::decode(&permission.encode()), Ok(permission));
        }
    }

    #[test]
    fn test_decode_normalizes_directory() {
        let permission = Permission::decode("wr:/data:0::p").unwrap();
        assert_eq!(permission.directory, "/data/");
        assert_eq!(permission.privileges, Access::READ_WRITE);
        assert_eq!(permission.recursive, Access::NONE);
        assert!(!permission.temporary);
    }

    #[test]
    fn test_decode_wrong_arity() {
        assert_eq!(
            Permission::decode("rw:/data:0:p"),
            Err(PermissionParseError::FieldCount {
                expected: 5,
                found: 4
            })
        );
        assert_eq!(
            Permission::decode("rw:/data:0::p:extra"),
            Err(PermissionParseError::FieldCount {
                expected: 5,
                found: 6
            })
        );
        assert!(matches!(
            Permission::decode_key_comment("rw:/data:0::p"),
            Err(PermissionParseError::FieldCount { found: 5, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_bad_fields() {
        assert_eq!(
            Permission::decode("rx:/data:0::p"),
            Err(PermissionParseError::InvalidAccess("rx".into()))
        );
        assert_eq!(
            Permission::decode("r:data:0::p"),
            Err(PermissionParseError::RelativeDirectory("data".into()))
        );
        assert!(matches!(
            Permission::decode("r:/data:lots::p"),
            Err(PermissionParseError::InvalidSize(_))
        ));
        assert_eq!(
            Permission::decode("r:/data:0::x"),
            Err(PermissionParseError::InvalidPermanence("x".into()))
        );
    }

    #[test]
    fn test_key_comment() {
        let permission = Permission::decode_key_comment("r::500:r").unwrap();
        assert_eq!(permission.privileges, Access::READ);
        assert_eq!(permission.directory, "");
        assert_eq!(permission.max_upload_size, 500);
        assert_eq!(permission.recursive, Access::READ);
        assert!(!permission.temporary);
    }
}
