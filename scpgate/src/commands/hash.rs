use anyhow::Result;
use scpgate_common::helpers::hash::hash_password;

use super::common::read_password;

pub(crate) async fn command() -> Result<()> {
    let input = read_password("Password to be hashed", false)?;
    let hash = hash_password(&input);
    println!("{hash}");
    Ok(())
}
