use std::collections::BTreeMap;

/// Cancellation handle for one scheduled timer. Cancelling a token whose timer
/// already fired (or was already cancelled) is a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

#[derive(Clone, Debug)]
struct TimerEntry<T> {
    due_ms: u64,
    period_ms: Option<u64>,
    payload: T,
}

/// Deadline table for one room. Timers fire in deadline order, ties in the
/// order they were scheduled.
#[derive(Clone, Debug)]
pub struct TimerTable<T> {
    next_token: u64,
    entries: BTreeMap<TimerToken, TimerEntry<T>>,
}

impl<T: Clone> TimerTable<T> {
    pub fn new() -> Self {
        Self {
            next_token: 1,
            entries: BTreeMap::new(),
        }
    }

    pub fn schedule_once(&mut self, now_ms: u64, delay_ms: u64, payload: T) -> TimerToken {
        self.insert(now_ms.saturating_add(delay_ms), None, payload)
    }

    pub fn schedule_repeating(&mut self, now_ms: u64, period_ms: u64, payload: T) -> TimerToken {
        let period_ms = period_ms.max(1);
        self.insert(now_ms.saturating_add(period_ms), Some(period_ms), payload)
    }

    /// Cancel-if-present. Returns whether a live timer was removed.
    pub fn cancel(&mut self, token: Option<TimerToken>) -> bool {
        match token {
            Some(token) => self.entries.remove(&token).is_some(),
            None => false,
        }
    }

    #[cfg(test)]
    pub fn is_active(&self, token: TimerToken) -> bool {
        self.entries.contains_key(&token)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.entries.values().map(|entry| entry.due_ms).min()
    }

    /// Takes the earliest timer due at or before `now_ms`, along with the
    /// deadline it fired for. A repeating timer is re-armed one period after
    /// its previous deadline, so a late driver catches up instead of drifting.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(TimerToken, u64, T)> {
        let (&token, _) = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.due_ms <= now_ms)
            .min_by_key(|(token, entry)| (entry.due_ms, **token))?;

        let entry = self.entries.get_mut(&token)?;
        let due_ms = entry.due_ms;
        let payload = entry.payload.clone();
        match entry.period_ms {
            Some(period_ms) => entry.due_ms = entry.due_ms.saturating_add(period_ms),
            None => {
                self.entries.remove(&token);
            }
        }
        Some((token, due_ms, payload))
    }

    fn insert(&mut self, due_ms: u64, period_ms: Option<u64>, payload: T) -> TimerToken {
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        self.entries.insert(
            token,
            TimerEntry {
                due_ms,
                period_ms,
                payload,
            },
        );
        token
    }
}

impl<T: Clone> Default for TimerTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(table: &mut TimerTable<&'static str>, now_ms: u64) -> Vec<&'static str> {
        let mut fired = Vec::new();
        while let Some((_, _, payload)) = table.pop_due(now_ms) {
            fired.push(payload);
        }
        fired
    }

    #[test]
    fn fires_in_deadline_then_schedule_order() {
        let mut table = TimerTable::new();
        table.schedule_once(0, 300, "late");
        table.schedule_once(0, 100, "first");
        table.schedule_once(0, 100, "second");
        assert_eq!(table.next_due(), Some(100));
        assert!(drain(&mut table, 99).is_empty());
        assert_eq!(drain(&mut table, 100), vec!["first", "second"]);
        assert_eq!(drain(&mut table, 1_000), vec!["late"]);
        assert!(table.is_empty());
    }

    #[test]
    fn repeating_timer_rearms_without_drift() {
        let mut table = TimerTable::new();
        table.schedule_repeating(0, 1_000, "tick");
        assert_eq!(drain(&mut table, 1_200), vec!["tick"]);
        assert_eq!(table.next_due(), Some(2_000));
        assert_eq!(drain(&mut table, 4_000), vec!["tick", "tick", "tick"]);
        assert_eq!(table.next_due(), Some(5_000));
    }

    #[test]
    fn late_pop_reports_the_missed_deadline() {
        let mut table = TimerTable::new();
        table.schedule_repeating(0, 1_000, "tick");
        let due: Vec<u64> = std::iter::from_fn(|| table.pop_due(3_500))
            .map(|(_, due_ms, _)| due_ms)
            .collect();
        assert_eq!(due, vec![1_000, 2_000, 3_000]);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut table = TimerTable::new();
        let token = table.schedule_once(0, 50, "expiry");
        assert!(table.is_active(token));
        assert!(table.cancel(Some(token)));
        assert!(!table.cancel(Some(token)));
        assert!(!table.cancel(None));
        assert!(drain(&mut table, 100).is_empty());
    }

    #[test]
    fn fired_one_shot_token_is_inactive() {
        let mut table = TimerTable::new();
        let token = table.schedule_once(0, 10, "once");
        assert_eq!(drain(&mut table, 10), vec!["once"]);
        assert!(!table.is_active(token));
        assert!(!table.cancel(Some(token)));
    }

    #[test]
    fn cancelling_between_pops_suppresses_same_instant_timer() {
        let mut table = TimerTable::new();
        table.schedule_once(0, 100, "end");
        let spawn = table.schedule_once(0, 100, "spawn");
        let (_, _, first) = table.pop_due(100).expect("end timer is due");
        assert_eq!(first, "end");
        table.cancel(Some(spawn));
        assert!(table.pop_due(100).is_none());
    }
}
