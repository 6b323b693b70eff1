//! Declarative chroot provisioning.
//!
//! "What to install" lives in a serializable [`Plan`]; turning it into
//! `arch-chroot` invocations is a pure function, and executing those is the
//! only part that touches the system.

use anyhow::{Context, Result};
use log::{info, warn};
use pibake_hal::InstallerHal;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSpec {
    pub name: String,
    pub groups: Vec<String>,
    pub shell: String,
}

/// Everything the chroot phase installs and enables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub packages: Vec<String>,
    pub user: UserSpec,
    pub services: Vec<String>,
}

impl Plan {
    /// The stock desktop plan: sway + foot + a status bar on NetworkManager.
    pub fn stock(username: &str) -> Self {
        Self {
            packages: vec![
                "sudo".to_string(),
                "networkmanager".to_string(),
                "sway".to_string(),
                "i3status".to_string(),
                "foot".to_string(),
                "polkit".to_string(),
            ],
            user: UserSpec {
                name: username.to_string(),
                groups: vec!["wheel".to_string(), "video".to_string()],
                shell: "/bin/bash".to_string(),
            },
            services: vec![
                "NetworkManager.service".to_string(),
                "systemd-timesyncd.service".to_string(),
            ],
        }
    }
}

/// One chroot command. Tolerated actions report failure as a warning
/// diagnostic instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub description: String,
    pub argv: Vec<String>,
    pub tolerate_failure: bool,
}

impl Action {
    fn new(description: &str, argv: &[&str]) -> Self {
        Self {
            description: description.to_string(),
            argv: argv.iter().map(|s| s.to_string()).collect(),
            tolerate_failure: false,
        }
    }

    fn tolerated(description: &str, argv: &[&str]) -> Self {
        Self {
            tolerate_failure: true,
            ..Self::new(description, argv)
        }
    }
}

/// Expand a plan into the ordered chroot command list.
pub fn plan_actions(plan: &Plan) -> Vec<Action> {
    let mut actions = vec![
        Action::new("initialise pacman keyring", &["pacman-key", "--init"]),
        Action::new(
            "populate Arch ARM keys",
            &["pacman-key", "--populate", "archlinuxarm"],
        ),
    ];

    let mut pacman = vec!["pacman", "-Syu", "--noconfirm"];
    pacman.extend(plan.packages.iter().map(String::as_str));
    actions.push(Action::new("install packages", &pacman));

    // Pi WiFi firmware is not in every mirror snapshot; missing it degrades
    // to wired-only, so the failure is a diagnostic, not an abort.
    actions.push(Action::tolerated(
        "install WiFi firmware",
        &["pacman", "-S", "--noconfirm", "firmware-raspberrypi"],
    ));

    actions.push(Action::new(
        "create login user",
        &[
            "useradd",
            "-m",
            "-G",
            &plan.user.groups.join(","),
            "-s",
            &plan.user.shell,
            &plan.user.name,
        ],
    ));
    actions.push(Action::new(
        "grant wheel sudo",
        &[
            "sh",
            "-c",
            "echo '%wheel ALL=(ALL:ALL) ALL' > /etc/sudoers.d/wheel",
        ],
    ));

    for service in &plan.services {
        actions.push(Action::new(
            &format!("enable {}", service),
            &["systemctl", "enable", service],
        ));
    }

    actions
}

/// Actions that must run after the config emitters wrote into the user's
/// home directory.
pub fn finalize_actions(plan: &Plan) -> Vec<Action> {
    let home = format!("/home/{}", plan.user.name);
    let owner = format!("{0}:{0}", plan.user.name);
    vec![Action::new(
        "own home directory",
        &["chown", "-R", &owner, &home],
    )]
}

/// Run actions inside the target root via `arch-chroot`.
pub fn execute(
    hal: &dyn InstallerHal,
    root: &Path,
    actions: &[Action],
    dry_run: bool,
) -> Result<()> {
    for action in actions {
        info!("🔧 {}", action.description);
        match hal.chroot_exec(root, &action.argv, dry_run) {
            Ok(()) => {}
            Err(err) if action.tolerate_failure => {
                warn!("⚠️ {} failed (continuing): {}", action.description, err);
            }
            Err(err) => {
                return Err(anyhow::Error::new(err))
                    .with_context(|| format!("provisioning step failed: {}", action.description));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pibake_hal::{FakeHal, Operation};

    #[test]
    fn actions_cover_keyring_packages_user_and_services() {
        let actions = plan_actions(&Plan::stock("pi"));

        assert_eq!(actions[0].argv, vec!["pacman-key", "--init"]);
        assert!(actions
            .iter()
            .any(|a| a.argv.starts_with(&["pacman".into(), "-Syu".into()])
                && a.argv.contains(&"sway".to_string())));
        assert!(actions.iter().any(|a| a.argv.first().map(String::as_str) == Some("useradd")
            && a.argv.contains(&"wheel,video".to_string())
            && a.argv.last().map(String::as_str) == Some("pi")));
        assert!(actions
            .iter()
            .any(|a| a.argv == ["systemctl", "enable", "NetworkManager.service"]));
    }

    #[test]
    fn only_wifi_firmware_step_is_tolerated() {
        let actions = plan_actions(&Plan::stock("pi"));
        let tolerated: Vec<_> = actions.iter().filter(|a| a.tolerate_failure).collect();
        assert_eq!(tolerated.len(), 1);
        assert!(tolerated[0].argv.contains(&"firmware-raspberrypi".to_string()));
    }

    #[test]
    fn tolerated_failure_does_not_abort() {
        let hal = FakeHal::new();
        hal.fail_chroot_containing("firmware-raspberrypi");
        let actions = plan_actions(&Plan::stock("pi"));
        execute(&hal, Path::new("/mnt"), &actions, false).unwrap();
        // Every action after the tolerated one still ran.
        let chroot_calls = hal
            .operations()
            .iter()
            .filter(|op| matches!(op, Operation::ChrootExec { .. }))
            .count();
        assert_eq!(chroot_calls, actions.len());
    }

    #[test]
    fn non_tolerated_failure_aborts() {
        let hal = FakeHal::new();
        hal.fail_chroot_containing("useradd");
        let actions = plan_actions(&Plan::stock("pi"));
        let err = execute(&hal, Path::new("/mnt"), &actions, false).unwrap_err();
        assert!(err.to_string().contains("create login user"));
    }

    #[test]
    fn finalize_chowns_the_home_directory() {
        let actions = finalize_actions(&Plan::stock("pi"));
        assert_eq!(
            actions[0].argv,
            vec!["chown", "-R", "pi:pi", "/home/pi"]
        );
    }

    #[test]
    fn plan_round_trips_through_json() {
        let plan = Plan::stock("pi");
        let json = serde_json::to_string(&plan).unwrap();
        assert_eq!(serde_json::from_str::<Plan>(&json).unwrap(), plan);
    }
}
