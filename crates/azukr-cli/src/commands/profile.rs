use azukr_core::db::KeyValueStore;
use azukr_core::{OwnerKey, RemoteGateway, SyncCoordinator, UserProfile};

use crate::commands::common::{describe_write, parse_assignments};
use crate::error::CliError;

pub async fn run_profile_show<S: KeyValueStore, G: RemoteGateway>(
    coordinator: &SyncCoordinator<S, G>,
    owner: &OwnerKey,
    as_json: bool,
    with_defaults: bool,
) -> Result<(), CliError> {
    let profile = load_profile(coordinator, owner, with_defaults).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    match profile {
        Some(profile) if !profile.is_empty() => {
            for line in format_profile_lines(&profile) {
                println!("{line}");
            }
        }
        _ => println!("No profile saved yet."),
    }
    Ok(())
}

pub async fn load_profile<S: KeyValueStore, G: RemoteGateway>(
    coordinator: &SyncCoordinator<S, G>,
    owner: &OwnerKey,
    with_defaults: bool,
) -> Result<Option<UserProfile>, CliError> {
    let profile = coordinator.effective_profile(owner).await?;
    if !with_defaults {
        return Ok(profile);
    }
    Ok(Some(profile.unwrap_or_default().with_defaults()))
}

pub async fn run_profile_set<S: KeyValueStore, G: RemoteGateway>(
    coordinator: &SyncCoordinator<S, G>,
    owner: &OwnerKey,
    fields: &[String],
) -> Result<(), CliError> {
    let mut profile = UserProfile::new();
    for (key, value) in parse_assignments(fields)? {
        profile.set(key, value);
    }

    let outcome = coordinator.save_profile(owner, profile).await?;
    println!("{}", describe_write(&outcome));
    Ok(())
}

pub fn format_profile_lines(profile: &UserProfile) -> Vec<String> {
    let mut entries = profile.fields().iter().collect::<Vec<_>>();
    entries.sort_by(|(left, _), (right, _)| left.cmp(right));
    entries
        .into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(text) => format!("{key}: {text}"),
            other => format!("{key}: {other}"),
        })
        .collect()
}
