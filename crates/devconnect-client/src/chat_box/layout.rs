//! Grouping rules for the message list.

use chrono::{Duration, FixedOffset, NaiveDate};

use devconnect_shared::constants::GROUPING_WINDOW_SECS;
use devconnect_shared::Message;

/// Presentation flags of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    /// Show avatar and sender name.
    pub show_header: bool,
    /// Show the time under the bubble.
    pub show_timestamp: bool,
    /// Insert a date separator above this row.
    pub date_separator: Option<NaiveDate>,
}

fn within_window(earlier: &Message, later: &Message) -> bool {
    later.created_at - earlier.created_at <= Duration::seconds(GROUPING_WINDOW_SECS)
}

/// Layout of an ascending message list. Calendar dates are taken in `offset`.
pub fn annotate<'a, I>(messages: I, offset: FixedOffset) -> Vec<RowLayout>
where
    I: IntoIterator<Item = &'a Message>,
{
    let messages: Vec<&Message> = messages.into_iter().collect();
    let mut rows = Vec::with_capacity(messages.len());

    for (i, message) in messages.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| messages[p]);
        let next = messages.get(i + 1).copied();

        let show_header = match prev {
            Some(prev) => prev.sender_id != message.sender_id || !within_window(prev, message),
            None => true,
        };

        let show_timestamp = match next {
            Some(next) => next.sender_id != message.sender_id || !within_window(message, next),
            None => true,
        };

        let date = message.created_at.with_timezone(&offset).date_naive();
        let date_separator = match prev {
            Some(prev) if prev.created_at.with_timezone(&offset).date_naive() == date => None,
            _ => Some(date),
        };

        rows.push(RowLayout {
            show_header: show_header || date_separator.is_some(),
            show_timestamp,
            date_separator,
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use devconnect_shared::{ChatId, MessageBody, MessageId, UserId};

    use super::*;

    fn at(sender: UserId, time: DateTime<Utc>) -> Message {
        Message {
            id: MessageId::new(),
            chat_id: ChatId::new(),
            sender_id: sender,
            body: MessageBody::text("x"),
            is_deleted: false,
            is_read: false,
            created_at: time,
        }
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn window_counts_fractional_seconds() {
        let a = UserId::new();
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let window = Duration::seconds(GROUPING_WINDOW_SECS);

        let exact = vec![at(a, t), at(a, t + window)];
        assert!(!annotate(&exact, utc())[1].show_header);

        let over = vec![at(a, t), at(a, t + window + Duration::milliseconds(900))];
        let rows = annotate(&over, utc());
        assert!(rows[0].show_timestamp);
        assert!(rows[1].show_header);
    }

    #[test]
    fn consecutive_messages_share_header() {
        let a = UserId::new();
        let b = UserId::new();
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let list = vec![
            at(a, t),
            at(a, t + Duration::minutes(2)),
            at(a, t + Duration::minutes(10)),
            at(b, t + Duration::minutes(11)),
        ];
        let rows = annotate(&list, utc());

        let headers: Vec<_> = rows.iter().map(|r| r.show_header).collect();
        assert_eq!(headers, vec![true, false, true, true]);

        let stamps: Vec<_> = rows.iter().map(|r| r.show_timestamp).collect();
        assert_eq!(stamps, vec![false, true, true, true]);
    }

    #[test]
    fn date_separator_on_day_change() {
        let a = UserId::new();
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 23, 58, 0).unwrap();
        let list = vec![at(a, t), at(a, t + Duration::minutes(1)), at(a, t + Duration::minutes(3))];

        let rows = annotate(&list, utc());
        assert!(rows[0].date_separator.is_some());
        assert!(rows[1].date_separator.is_none());
        assert_eq!(
            rows[2].date_separator,
            NaiveDate::from_ymd_opt(2024, 3, 2)
        );
        // A new day restarts the group.
        assert!(rows[2].show_header);
    }

    #[test]
    fn offset_moves_the_day_boundary() {
        let a = UserId::new();
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap();
        let list = vec![at(a, t), at(a, t + Duration::hours(1))];

        assert!(annotate(&list, utc())[1].date_separator.is_some());
        let plus_three = FixedOffset::east_opt(3 * 3600).unwrap();
        assert!(annotate(&list, plus_three)[1].date_separator.is_none());
    }
}
