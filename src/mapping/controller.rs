//! Control change mapper with throttling
//!
//! Small changes are sent at most once per interval, repeated values are
//! never resent, and a jump of at least `jump_threshold` goes out
//! immediately.

use std::time::Duration;

use super::OutputMapper;
use crate::engine::MidiEvent;

pub struct ControllerMapper {
    controller: u8,
    interval: Duration,
    jump_threshold: u8,
    last_sent: Option<(u8, Duration)>,
}

impl ControllerMapper {
    pub fn new(controller: u8, interval: Duration, jump_threshold: u8) -> Self {
        Self {
            controller: controller.min(127),
            interval,
            jump_threshold: jump_threshold.max(1),
            last_sent: None,
        }
    }

    /// Last value sent, if any
    pub fn last_value(&self) -> Option<u8> {
        self.last_sent.map(|(value, _)| value)
    }

    fn should_send(&self, value: u8, timestamp: Duration) -> bool {
        match self.last_sent {
            None => true,
            Some((last, _)) if last == value => false,
            Some((last, _)) if last.abs_diff(value) >= self.jump_threshold => true,
            Some((_, at)) => timestamp.saturating_sub(at) >= self.interval,
        }
    }
}

impl OutputMapper for ControllerMapper {
    fn name(&self) -> &str {
        "cc"
    }

    fn on_value(&mut self, value: u8, timestamp: Duration) -> Vec<MidiEvent> {
        if !self.should_send(value, timestamp) {
            return Vec::new();
        }
        self.last_sent = Some((value, timestamp));
        vec![MidiEvent::ControlChange {
            controller: self.controller,
            value,
        }]
    }

    fn finish(&mut self) -> Vec<MidiEvent> {
        // A controller holds its last value; there is nothing to release.
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_mapper_names() {
        let mappers: Vec<Box<dyn OutputMapper>> = vec![
            Box::new(crate::mapping::NoteMapper::new(100)),
            Box::new(ControllerMapper::new(1, ms(10), 8)),
        ];
        let names: Vec<&str> = mappers.iter().map(|m| m.name()).collect();
        assert_eq!(names, ["note", "cc"]);
    }

    fn cc(value: u8) -> MidiEvent {
        MidiEvent::ControlChange { controller: 115, value }
    }

    #[test]
    fn test_first_value_sent() {
        let mut mapper = ControllerMapper::new(115, ms(10), 8);
        assert_eq!(mapper.on_value(40, ms(0)), vec![cc(40)]);
        assert_eq!(mapper.last_value(), Some(40));
    }

    #[test]
    fn test_repeated_value_never_resent() {
        let mut mapper = ControllerMapper::new(115, ms(10), 8);
        mapper.on_value(40, ms(0));

        for t in 1..100 {
            assert!(mapper.on_value(40, ms(t * 5)).is_empty());
        }
    }

    #[test]
    fn test_small_changes_throttled() {
        let mut mapper = ControllerMapper::new(115, ms(10), 8);
        assert_eq!(mapper.on_value(40, ms(0)), vec![cc(40)]);
        assert!(mapper.on_value(41, ms(1)).is_empty());
        assert!(mapper.on_value(42, ms(5)).is_empty());
        assert_eq!(mapper.on_value(43, ms(10)), vec![cc(43)]);
    }

    #[test]
    fn test_held_back_value_catches_up() {
        let mut mapper = ControllerMapper::new(115, ms(10), 8);
        mapper.on_value(40, ms(0));
        assert!(mapper.on_value(42, ms(2)).is_empty());

        // Signal settles on 42; it goes out once the interval has passed
        assert!(mapper.on_value(42, ms(6)).is_empty());
        assert_eq!(mapper.on_value(42, ms(11)), vec![cc(42)]);
        assert!(mapper.on_value(42, ms(30)).is_empty());
    }

    #[test]
    fn test_large_jump_bypasses_throttle() {
        let mut mapper = ControllerMapper::new(115, ms(10), 8);
        mapper.on_value(40, ms(0));
        assert_eq!(mapper.on_value(48, ms(1)), vec![cc(48)]);
        assert_eq!(mapper.on_value(20, ms(2)), vec![cc(20)]);
    }

    #[test]
    fn test_finish_is_silent() {
        let mut mapper = ControllerMapper::new(115, ms(10), 8);
        mapper.on_value(64, ms(0));
        assert!(mapper.finish().is_empty());
    }

    proptest! {
        #[test]
        fn throttle_law(steps in prop::collection::vec((0u8..=127, 0u64..4), 1..300)) {
            let interval = ms(10);
            let jump = 8u8;
            let mut mapper = ControllerMapper::new(115, interval, jump);

            let mut now = Duration::ZERO;
            let mut last: Option<(u8, Duration)> = None;
            for (value, advance) in steps {
                now += ms(advance);
                let events = mapper.on_value(value, now);
                prop_assert!(events.len() <= 1);

                let is_jump = last.map_or(true, |(v, _)| v.abs_diff(value) >= jump);
                if is_jump {
                    // Genuinely new information is never suppressed
                    prop_assert_eq!(events.len(), 1);
                }
                if let Some(MidiEvent::ControlChange { value: sent, .. }) = events.first() {
                    prop_assert_eq!(*sent, value);
                    if let Some((prev, at)) = last {
                        prop_assert!(prev != value);
                        prop_assert!(is_jump || now - at >= interval);
                    }
                    last = Some((value, now));
                }
            }
        }
    }
}
