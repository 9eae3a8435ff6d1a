use std::{
    sync::mpsc::{Receiver, RecvTimeoutError},
    time::{Duration, Instant},
};

use chrono::NaiveDateTime;
use log::{debug, warn};
use rand::Rng;

use crate::{
    communication::Message,
    machine::{AlarmMachine, AlarmSession, Event},
    store::Store,
};

/// Keeps drivers ticking at a fixed rate.
#[derive(Debug, Clone, Copy)]
pub struct Ticker {
    interval: Duration,
    next: Instant,
}

impl Ticker {
    #[must_use]
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            next: start + interval,
        }
    }

    /// Returns true at most once per interval. Missed ticks are not made up
    /// for, the schedule just restarts from `now`.
    pub fn due(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next += self.interval;
        if self.next <= now {
            self.next = now + self.interval;
        }
        true
    }

    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.next.saturating_duration_since(now)
    }
}

/// Applies a message to the machine, returning whether anything changed.
pub fn apply<S: Store, R: Rng>(
    machine: &mut AlarmMachine<S, R>,
    message: Message,
    now: NaiveDateTime,
) -> bool {
    match message {
        Message::WakeUp => machine.wake_up(),
        Message::AnotherRound => machine.another_round(),
        Message::Acknowledge => machine.acknowledge(now),
        Message::Disarm => machine.disarm(),
        Message::Reset => machine.reset(),
        Message::PhotoLoaded(photo) => machine.add_photo(photo),
        Message::PhotoFailed { path, reason } => {
            warn!("skipping {}: {reason}", path.display());
            false
        }
        Message::Quit => false,
    }
}

/// Runs the machine until a [`Message::Quit`] arrives or every sender is gone.
///
/// Pending messages are always handled before a due tick, so an action
/// taken in the same moment the countdown would expire still counts.
/// `report` is called after every tick and every applied message.
pub fn run<S, R, C, F>(
    machine: &mut AlarmMachine<S, R>,
    receiver: &Receiver<Message>,
    interval: Duration,
    clock: C,
    mut report: F,
) where
    S: Store,
    R: Rng,
    C: Fn() -> NaiveDateTime,
    F: FnMut(&AlarmSession, Option<&Event>),
{
    let mut ticker = Ticker::new(interval, Instant::now());
    'driver: loop {
        let mut next = match receiver.recv_timeout(ticker.remaining(Instant::now())) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        while let Some(message) = next {
            if matches!(message, Message::Quit) {
                break 'driver;
            }
            debug!("handling {message:?}");
            if apply(machine, message, clock()) {
                report(machine.session(), None);
            }
            next = receiver.try_recv().ok();
        }
        if ticker.due(Instant::now()) {
            let event = machine.tick(clock());
            report(machine.session(), event.as_ref());
        }
    }
    machine.shutdown();
}

/// One line summary of the session for the terminal.
#[must_use]
pub fn describe(session: &AlarmSession) -> String {
    use crate::machine::LifecycleState as S;

    let photo = || {
        session
            .selected_photo
            .as_ref()
            .map_or_else(|| "no photo".to_string(), ToString::to_string)
    };
    match session.state {
        S::Idle => format!("idle, {} photos", session.photos.len()),
        S::Armed => {
            let left = session.seconds_until_alarm;
            format!(
                "armed for {}, {}h {}m {}s left",
                session
                    .armed_time
                    .map_or_else(String::new, |t| t.to_string()),
                left / 3600,
                (left % 3600) / 60,
                left % 60
            )
        }
        S::Ringing | S::Penalty if session.disclosed => {
            format!("{} was sent! [r]ound again or [x] reset", photo())
        }
        S::Ringing => format!(
            "WAKE UP! {} goes out in {}s, [w]ake",
            photo(),
            session.seconds_until_penalty
        ),
        S::Penalty => format!(
            "TIME'S UP! sending {} in {}s, [w] cancel",
            photo(),
            session.seconds_until_penalty
        ),
        S::Resolved => "good morning! [o]k".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use chrono::NaiveDate;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        machine::{LifecycleState, Policy},
        photo::PhotoHandle,
        store::MemoryStore,
    };

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .unwrap()
    }

    #[test]
    fn ticker_fires_once_per_interval() {
        let start = Instant::now();
        let mut ticker = Ticker::new(Duration::from_secs(1), start);
        assert!(!ticker.due(start));
        assert_eq!(ticker.remaining(start), Duration::from_secs(1));
        assert!(ticker.due(start + Duration::from_millis(1000)));
        assert!(!ticker.due(start + Duration::from_millis(1500)));
        assert!(ticker.due(start + Duration::from_millis(2000)));
        // a long stall gives one tick, not a burst
        assert!(ticker.due(start + Duration::from_secs(10)));
        assert!(!ticker.due(start + Duration::from_millis(10_500)));
        assert_eq!(
            ticker.remaining(start + Duration::from_millis(10_500)),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn wake_up_beats_a_pending_tick() {
        let mut machine =
            AlarmMachine::with_rng(MemoryStore::new(), Policy::default(), StdRng::seed_from_u64(1));
        let photo = PhotoHandle::new(None, "data:x".to_string());
        machine.arm("07:00", vec![photo], at(6, 59, 59)).unwrap();
        machine.tick(at(7, 0, 0));
        for _ in 0..9 {
            machine.tick(at(7, 0, 1));
        }
        assert_eq!(machine.session().seconds_until_penalty, 1);

        let (tx, rx) = mpsc::channel();
        tx.send(Message::WakeUp).unwrap();
        tx.send(Message::Quit).unwrap();
        let mut states = vec![];
        // zero interval: a tick is due on every pass
        run(&mut machine, &rx, Duration::ZERO, || at(7, 0, 2), |s, _| {
            states.push(s.state);
        });
        assert_eq!(states, vec![LifecycleState::Resolved]);
        assert_eq!(machine.state(), LifecycleState::Resolved);
    }

    #[test]
    fn run_applies_photos_and_stops_when_senders_go_away() {
        let mut machine = AlarmMachine::with_rng(
            MemoryStore::new(),
            Policy::default(),
            StdRng::seed_from_u64(1),
        );
        let (tx, rx) = mpsc::channel();
        tx.send(Message::PhotoLoaded(PhotoHandle::new(None, "a".to_string())))
            .unwrap();
        tx.send(Message::PhotoFailed {
            path: "b.png".into(),
            reason: "gone".to_string(),
        })
        .unwrap();
        drop(tx);
        run(
            &mut machine,
            &rx,
            Duration::from_secs(60),
            || at(6, 0, 0),
            |_, _| {},
        );
        assert_eq!(machine.session().photos.len(), 1);
        assert_eq!(machine.active_timer(), None);
    }

    #[test]
    fn describes_each_state() {
        let mut session = AlarmSession {
            photos: vec![PhotoHandle::from_content("x".to_string())],
            ..AlarmSession::default()
        };
        assert_eq!(describe(&session), "idle, 1 photos");

        session.state = LifecycleState::Armed;
        session.armed_time = "07:00".parse().ok();
        session.seconds_until_alarm = 3_725;
        assert_eq!(describe(&session), "armed for 07:00, 1h 2m 5s left");

        session.state = LifecycleState::Penalty;
        session.seconds_until_penalty = 4;
        session.selected_photo = Some(PhotoHandle::new(Some("me.png".to_string()), "x".to_string()));
        assert_eq!(describe(&session), "TIME'S UP! sending me.png in 4s, [w] cancel");

        session.disclosed = true;
        assert!(describe(&session).starts_with("me.png was sent!"));
    }
}
