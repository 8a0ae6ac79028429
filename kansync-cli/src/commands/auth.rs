//! Sign-in bookkeeping.
//!
//! kansync does not authenticate anyone itself: `login` records the
//! identity your auth system established, and the controllers read it
//! as the current-user context.

use anyhow::Result;

use kansync_core::CurrentUser;

use crate::config::{GlobalConfig, UserConfig};

pub fn login(mut config: GlobalConfig, user_id: String, name: Option<String>) -> Result<()> {
    let display = name.clone().unwrap_or_else(|| user_id.clone());
    config.user = Some(UserConfig { id: user_id, name });
    config.save()?;
    println!("Signed in as {}", display);
    Ok(())
}

pub fn logout(mut config: GlobalConfig) -> Result<()> {
    config.user = None;
    config.save()?;
    println!("Signed out");
    Ok(())
}

pub fn whoami(config: &GlobalConfig) -> Result<()> {
    match config.current_user() {
        CurrentUser::Anonymous => println!("Not signed in"),
        CurrentUser::SignedIn(user) => match user.name {
            Some(name) => println!("{} ({})", name, user.id),
            None => println!("{}", user.id),
        },
    }
    Ok(())
}
