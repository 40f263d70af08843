use std::path::PathBuf;

use crate::ListenEndpoint;

pub(crate) fn _default_listen() -> ListenEndpoint {
    #[allow(clippy::unwrap_used)]
    ListenEndpoint::resolve(":2022").unwrap()
}

#[inline]
pub(crate) fn _default_host_keys_path() -> String {
    "./data/keys".to_owned()
}

#[inline]
pub(crate) fn _default_scp_path() -> PathBuf {
    PathBuf::from("/usr/bin/scp")
}

#[inline]
pub(crate) fn _default_empty_vec<T>() -> Vec<T> {
    vec![]
}
