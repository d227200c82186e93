//! Plain-text digest of newly found trackings, grouped by buying group.

use chrono::NaiveDate;

use crate::tracking::Tracking;

pub fn digest_subject(date: NaiveDate) -> String {
    format!("Tracking Numbers {}", date.format("%Y-%m-%d"))
}

/// One block per group in first-seen order, one line per tracking:
/// `tracking / order ids / destination email / items`.
pub fn render_digest(trackings: &[Tracking]) -> String {
    let mut groups: Vec<(&str, Vec<&Tracking>)> = Vec::new();
    for tracking in trackings {
        match groups.iter_mut().find(|(g, _)| *g == tracking.group) {
            Some((_, members)) => members.push(tracking),
            None => groups.push((tracking.group.as_str(), vec![tracking])),
        }
    }

    let mut content = String::from("Tracking number / order number(s) per group:\n\n");
    for (group, members) in groups {
        let lines: Vec<String> = members
            .iter()
            .map(|t| {
                let orders: Vec<&str> = t.order_ids.iter().map(String::as_str).collect();
                format!(
                    "{} / {} / {} / {}",
                    t.tracking_number,
                    orders.join(", "),
                    t.to_email,
                    t.items
                )
            })
            .collect();
        content.push_str(&format!("{group} ({}):\n", lines.len()));
        content.push_str(&lines.join("\n"));
        content.push_str("\n\n");
    }
    content.push_str(
        "These are the new tracking numbers that we have found. \
         See the spreadsheet for all tracking numbers.",
    );
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_in_first_seen_order() {
        let mut a = Tracking::new("T1", "zeta", ["o2", "o1"]);
        a.to_email = "x@example.com".into();
        a.items = "Widget".into();
        let b = Tracking::new("T2", "alpha", ["o3"]);
        let c = Tracking::new("T3", "zeta", ["o4"]);

        let text = render_digest(&[a, b, c]);
        let expected = "Tracking number / order number(s) per group:\n\n\
                        zeta (2):\n\
                        T1 / o1, o2 / x@example.com / Widget\n\
                        T3 / o4 /  / \n\n\
                        alpha (1):\n\
                        T2 / o3 /  / \n\n\
                        These are the new tracking numbers that we have found. \
                        See the spreadsheet for all tracking numbers.";
        assert_eq!(text, expected);
    }

    #[test]
    fn subject_has_date() {
        let d = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(digest_subject(d), "Tracking Numbers 2026-01-15");
    }
}
