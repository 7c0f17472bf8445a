//! Notification text for player presence changes and raid attendance.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::common::{PlayerChange, RaidMember};

/// Names listed in a raid summary before the remainder is elided.
const RAID_ROSTER_LIMIT: usize = 20;

fn emoji(shortcode: &str) -> &'static str {
    emojis::get_by_shortcode(shortcode)
        .map(|e| e.as_str())
        .unwrap_or("")
}

/// Render a login/logout notice.
pub fn player_change_message(change: &PlayerChange) -> String {
    let (icon, title, verb) = if change.online {
        (emoji("green_circle"), "Player Online", "logged in")
    } else {
        (emoji("red_circle"), "Player Offline", "logged off")
    };

    let mut text = format!("{} **{}**\n**{}** has {}", icon, title, change.name, verb);
    if !change.class.is_empty() && change.level > 0 {
        text.push_str(&format!("\nLevel {} {}", change.level, change.class));
    }
    if !change.zone.is_empty() {
        text.push_str(&format!("\nZone: {}", change.zone));
    }
    text
}

/// Comma-separated class counts, e.g. "CLERIC: 2, WARRIOR: 1".
fn class_breakdown(members: &[RaidMember]) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for member in members {
        let class = member.class.map(|c| c.token()).unwrap_or("Unknown");
        *counts.entry(class).or_default() += 1;
    }
    counts
        .iter()
        .map(|(class, count)| format!("{}: {}", class, count))
        .collect::<Vec<_>>()
        .join(", ")
}

fn roster_list(members: &[RaidMember]) -> String {
    let mut list = members
        .iter()
        .take(RAID_ROSTER_LIMIT)
        .map(|m| m.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    if members.len() > RAID_ROSTER_LIMIT {
        list.push_str(&format!(
            "\n...and {} more",
            members.len() - RAID_ROSTER_LIMIT
        ));
    }
    list
}

/// Summary posted after attendance was synced.
pub fn raid_synced_message(members: &[RaidMember], at: DateTime<Utc>) -> String {
    format!(
        "{} **Raid Attendance Synced**\n**Players:** {}\n**Classes:** {}\n**Roster:** {}\n*Synced at {} UTC*",
        emoji("clipboard"),
        members.len(),
        class_breakdown(members),
        roster_list(members),
        at.format("%H:%M:%S"),
    )
}

/// Summary posted when a dump was captured but not synced.
pub fn raid_captured_message(members: &[RaidMember], at: DateTime<Utc>) -> String {
    format!(
        "{} **Raid Dump Captured**\n**Players:** {}\n**Classes:** {}\n**Roster:** {}\n*Captured at {} UTC*",
        emoji("clipboard"),
        members.len(),
        class_breakdown(members),
        roster_list(members),
        at.format("%H:%M:%S"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::CharacterClass;
    use chrono::TimeZone;

    fn change(online: bool) -> PlayerChange {
        PlayerChange {
            name: "Alice".to_string(),
            class: "Warrior".to_string(),
            level: 60,
            zone: "qeynos".to_string(),
            online,
        }
    }

    #[test]
    fn test_player_login_message() {
        let text = player_change_message(&change(true));
        assert!(text.contains("**Player Online**"));
        assert!(text.ends_with("**Alice** has logged in\nLevel 60 Warrior\nZone: qeynos"));
    }

    #[test]
    fn test_player_logoff_without_details() {
        let mut departed = change(false);
        departed.level = 0;
        departed.zone = String::new();
        let text = player_change_message(&departed);
        assert!(text.ends_with("**Alice** has logged off"));
    }

    #[test]
    fn test_raid_synced_message() {
        let members = vec![
            RaidMember {
                name: "A".to_string(),
                level: 60,
                class: Some(CharacterClass::Warrior),
                group_number: 1,
            },
            RaidMember {
                name: "B".to_string(),
                level: 55,
                class: Some(CharacterClass::Cleric),
                group_number: 2,
            },
            RaidMember::named("C"),
        ];
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 20, 15, 0).unwrap();
        let text = raid_synced_message(&members, at);

        assert!(text.contains("**Players:** 3"));
        assert!(text.contains("**Classes:** CLERIC: 1, Unknown: 1, WARRIOR: 1"));
        assert!(text.contains("**Roster:** A, B, C"));
        assert!(text.ends_with("*Synced at 20:15:00 UTC*"));
    }

    #[test]
    fn test_raid_roster_elides_after_limit() {
        let members: Vec<RaidMember> = (0..25)
            .map(|i| RaidMember::named(format!("P{}", i)))
            .collect();
        let list = roster_list(&members);
        assert!(list.ends_with("P19\n...and 5 more"));
        assert!(!list.contains("P20"));
    }
}
