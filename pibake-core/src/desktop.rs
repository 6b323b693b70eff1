//! Desktop session configuration written into the target: sway, i3status,
//! foot, and an autologin drop-in for tty1.

use anyhow::Result;
use log::info;
use std::fs;
use std::path::Path;

const SWAY_CONFIG: &str = "\
# pibake sway config
set $mod Mod4
set $term foot

output * bg #202020 solid_color

bindsym $mod+Return exec $term
bindsym $mod+d exec wmenu-run
bindsym $mod+Shift+q kill
bindsym $mod+Shift+e exec swaymsg exit

bar {
    position top
    status_command i3status
}

include /etc/sway/config.d/*
";

const I3STATUS_CONFIG: &str = "\
general {
    colors = true
    interval = 5
}

order += \"ethernet _first_\"
order += \"wireless _first_\"
order += \"load\"
order += \"tztime local\"

ethernet _first_ {
    format_up = \"E: %ip\"
    format_down = \"E: down\"
}

wireless _first_ {
    format_up = \"W: %essid %ip\"
    format_down = \"W: down\"
}

load {
    format = \"load %1min\"
}

tztime local {
    format = \"%Y-%m-%d %H:%M\"
}
";

const FOOT_CONFIG: &str = "\
[main]
font=monospace:size=10

[colors]
alpha=0.95
";

fn autologin_dropin(username: &str) -> String {
    format!(
        "[Service]\n\
         ExecStart=\n\
         ExecStart=-/usr/bin/agetty --autologin {} --noclear %I $TERM\n",
        username
    )
}

/// Start sway from the login shell on tty1.
fn bash_profile() -> &'static str {
    "if [ -z \"$WAYLAND_DISPLAY\" ] && [ \"$(tty)\" = \"/dev/tty1\" ]; then\n\
     \texec sway\n\
     fi\n"
}

/// Write the desktop configuration into the mounted root. Ownership is fixed
/// afterwards from inside the chroot, so plain root-owned writes are fine
/// here.
pub fn write(root: &Path, username: &str, dry_run: bool) -> Result<()> {
    if dry_run {
        info!("DRY RUN: write desktop configuration for {}", username);
        return Ok(());
    }
    info!("🖥️  Writing desktop configuration for {}", username);

    let home = root.join("home").join(username);
    for (rel, contents) in [
        ("sway/config", SWAY_CONFIG),
        ("i3status/config", I3STATUS_CONFIG),
        ("foot/foot.ini", FOOT_CONFIG),
    ] {
        let path = home.join(".config").join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
    }
    fs::write(home.join(".bash_profile"), bash_profile())?;

    let dropin_dir = root.join("etc/systemd/system/getty@tty1.service.d");
    fs::create_dir_all(&dropin_dir)?;
    fs::write(dropin_dir.join("autologin.conf"), autologin_dropin(username))?;
    Ok(())
}
