//! The alarm lifecycle.
//!
//! ```text
//! idle --arm--> armed --tick reaches target--> ringing --countdown hits 0--> penalty
//!                 |                             |    ^                          |
//!               disarm                      wake up  '------another round-------'
//!                 v                             v                               |
//!               idle                        resolved <--------cancel-----------'
//! ```
//!
//! The machine never looks at the clock itself. Drivers hand it one
//! wall-clock sample per tick and forward user actions as they happen.

use std::{fmt, time::Duration};

use chrono::NaiveDateTime;
use log::{info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    alarm::{seconds_until, AlarmConfig, AlarmTime},
    config::{Config, PenaltyExpiry, PostWake, DEFAULT_PENALTY_SECONDS},
    error::{AlarmError, StoreError},
    photo::PhotoHandle,
    store::Store,
};

/// How often drivers sample the clock.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    Armed,
    Ringing,
    Penalty,
    Resolved,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Armed => "armed",
            Self::Ringing => "ringing",
            Self::Penalty => "penalty",
            Self::Resolved => "resolved",
        })
    }
}

/// The periodic job a session is currently running. Each state owns at most
/// one, and it is dropped as soon as the state is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// is it time yet
    AlarmPoll,
    /// counting down to the penalty while ringing
    RingingCountdown,
    /// counting down to the photo going out
    PenaltyCountdown,
}

/// Something a tick caused, for drivers to show or log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Fired,
    PenaltyStarted,
    /// the round is lost, the selected photo counts as sent
    Disclosed(PhotoHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub penalty_seconds: u32,
    pub on_penalty_expire: PenaltyExpiry,
    pub post_wake: PostWake,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            penalty_seconds: DEFAULT_PENALTY_SECONDS,
            on_penalty_expire: PenaltyExpiry::default(),
            post_wake: PostWake::default(),
        }
    }
}

impl Policy {
    /// A zero length window would make waking up impossible.
    #[must_use]
    pub fn with_window(self) -> Self {
        Self {
            penalty_seconds: self.penalty_seconds.max(1),
            ..self
        }
    }
}

impl From<&Config> for Policy {
    fn from(config: &Config) -> Self {
        Self {
            penalty_seconds: config.penalty_seconds,
            on_penalty_expire: config.on_penalty_expire,
            post_wake: config.post_wake,
        }
        .with_window()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlarmSession {
    pub state: LifecycleState,
    /// armed time, or the last stored one waiting to be re-armed while idle
    pub armed_time: Option<AlarmTime>,
    pub target: Option<NaiveDateTime>,
    pub photos: Vec<PhotoHandle>,
    pub selected_photo: Option<PhotoHandle>,
    pub seconds_until_alarm: u64,
    pub seconds_until_penalty: u32,
    /// set once the current round's countdown ran out
    pub disclosed: bool,
    pub timer: Option<Timer>,
}

pub struct AlarmMachine<S, R = StdRng> {
    session: AlarmSession,
    policy: Policy,
    store: S,
    rng: R,
    degraded: bool,
}

impl<S: Store> AlarmMachine<S> {
    #[must_use]
    pub fn new(store: S, policy: Policy) -> Self {
        Self::with_rng(store, policy, StdRng::from_entropy())
    }

    /// Builds a machine from whatever was stored last time. The session always
    /// starts idle; a stored alarm only pre-fills the time and photos so
    /// [`AlarmMachine::resume`] can arm it again.
    #[must_use]
    pub fn restore(store: S, policy: Policy) -> Self {
        let mut machine = Self::new(store, policy);
        machine.rehydrate();
        machine
    }
}

impl<S: Store, R: Rng> AlarmMachine<S, R> {
    pub fn with_rng(store: S, policy: Policy, rng: R) -> Self {
        let policy = policy.with_window();
        Self {
            session: AlarmSession {
                seconds_until_penalty: policy.penalty_seconds,
                ..AlarmSession::default()
            },
            policy,
            store,
            rng,
            degraded: false,
        }
    }

    pub fn rehydrate(&mut self) {
        let alarm = self.store.load_alarm().unwrap_or_else(|e| {
            self.note_store_error("load the alarm", &e);
            None
        });
        let cached = self.store.load_photos().unwrap_or_else(|e| {
            self.note_store_error("load photos", &e);
            None
        });
        let (time, alarm_photos) = match alarm {
            Some(AlarmConfig { time, photos }) => (Some(time), Some(photos)),
            None => (None, None),
        };
        self.session.armed_time = time;
        self.session.photos = cached.or(alarm_photos).unwrap_or_default();
        info!(
            "restored {} photos, stored alarm: {}",
            self.session.photos.len(),
            time.map_or_else(|| "none".to_string(), |t| t.to_string())
        );
    }

    #[must_use]
    pub const fn session(&self) -> &AlarmSession {
        &self.session
    }

    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.session.state
    }

    #[must_use]
    pub const fn active_timer(&self) -> Option<Timer> {
        self.session.timer
    }

    #[must_use]
    pub const fn policy(&self) -> &Policy {
        &self.policy
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// A countdown that is already running keeps its length.
    pub fn set_policy(&mut self, policy: Policy) {
        self.policy = policy.with_window();
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// true once a store operation failed and the session is running from memory
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Whether wake up / cancel would currently be accepted.
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        matches!(
            self.session.state,
            LifecycleState::Ringing | LifecycleState::Penalty
        ) && !self.session.disclosed
            && self.session.seconds_until_penalty > 0
    }

    pub fn arm(
        &mut self,
        time: &str,
        photos: Vec<PhotoHandle>,
        now: NaiveDateTime,
    ) -> Result<(), AlarmError> {
        match self.session.state {
            LifecycleState::Idle => {}
            LifecycleState::Armed => return Err(AlarmError::AlreadyArmed),
            state => return Err(AlarmError::NotIdle(state)),
        }
        let time: AlarmTime = time.parse()?;
        if photos.is_empty() {
            return Err(AlarmError::NoPhotos);
        }

        let config = AlarmConfig { time, photos };
        if let Err(e) = self.store.save_alarm(&config) {
            self.note_store_error("save the alarm", &e);
        }
        self.session.photos = config.photos;
        self.enter_armed(time, now);
        Ok(())
    }

    /// Arms the stored (or last used) time again with the current photos.
    pub fn resume(&mut self, now: NaiveDateTime) -> Result<(), AlarmError> {
        let time = self
            .session
            .armed_time
            .ok_or(AlarmError::NothingToResume)?;
        let photos = self.session.photos.clone();
        self.arm(&time.to_string(), photos, now)
    }

    /// Arms like [`AlarmMachine::arm`], but also refuses while a restored
    /// alarm is still waiting to be resumed. Used by one-shot callers that
    /// never resume, so they can't quietly replace an alarm someone else
    /// is running.
    pub fn arm_unless_pending(
        &mut self,
        time: &str,
        photos: Vec<PhotoHandle>,
        now: NaiveDateTime,
    ) -> Result<(), AlarmError> {
        if self.session.state == LifecycleState::Idle && self.session.armed_time.is_some() {
            return Err(AlarmError::AlreadyArmed);
        }
        self.arm(time, photos, now)
    }

    /// Advances whichever timer is running using a single clock sample.
    pub fn tick(&mut self, now: NaiveDateTime) -> Option<Event> {
        match self.session.timer? {
            Timer::AlarmPoll => {
                let target = self.session.target?;
                self.session.seconds_until_alarm = seconds_until(target, now);
                if now >= target {
                    info!("alarm for {target} fired at {now}");
                    self.start_round();
                    Some(Event::Fired)
                } else {
                    None
                }
            }
            Timer::RingingCountdown => {
                if !self.count_down() {
                    return None;
                }
                match self.policy.on_penalty_expire {
                    PenaltyExpiry::TransitionToPenalty => {
                        self.session.state = LifecycleState::Penalty;
                        self.session.seconds_until_penalty = self.policy.penalty_seconds;
                        self.session.timer = Some(Timer::PenaltyCountdown);
                        info!("no wake up in time, penalty countdown started");
                        Some(Event::PenaltyStarted)
                    }
                    PenaltyExpiry::MarkSent => self.disclose(),
                }
            }
            Timer::PenaltyCountdown => {
                if self.count_down() {
                    self.disclose()
                } else {
                    None
                }
            }
        }
    }

    /// "I woke up". Only accepted while a countdown is still running.
    pub fn wake_up(&mut self) -> bool {
        if !self.is_cancellable() {
            return false;
        }
        info!(
            "woke up in {} with {}s to spare",
            self.session.state, self.session.seconds_until_penalty
        );
        if self.policy.post_wake == PostWake::Disarm {
            self.clear_stored_alarm();
        }
        self.session.state = LifecycleState::Resolved;
        self.session.timer = None;
        self.session.selected_photo = None;
        self.session.seconds_until_alarm = 0;
        self.session.seconds_until_penalty = self.policy.penalty_seconds;
        true
    }

    /// Cancel from the penalty screen, same rules as [`AlarmMachine::wake_up`].
    pub fn cancel(&mut self) -> bool {
        self.wake_up()
    }

    /// Starts a fresh round with a newly drawn photo.
    pub fn another_round(&mut self) -> bool {
        let allowed = match self.session.state {
            LifecycleState::Penalty => true,
            LifecycleState::Ringing => self.session.disclosed,
            _ => false,
        };
        if allowed {
            info!("starting another round");
            self.start_round();
        }
        allowed
    }

    /// Leaves `resolved`, either back to idle or armed for the next day.
    pub fn acknowledge(&mut self, now: NaiveDateTime) -> bool {
        if self.session.state != LifecycleState::Resolved {
            return false;
        }
        match (self.policy.post_wake, self.session.armed_time) {
            (PostWake::RearmNextDay, Some(time)) => self.enter_armed(time, now),
            _ => self.to_idle(),
        }
        true
    }

    pub fn disarm(&mut self) -> bool {
        if self.session.state != LifecycleState::Armed {
            return false;
        }
        info!("alarm disarmed");
        self.clear_stored_alarm();
        self.to_idle();
        true
    }

    /// Drops whatever is going on and goes back to idle. Photos are kept.
    pub fn reset(&mut self) -> bool {
        if self.session.state == LifecycleState::Idle {
            return false;
        }
        info!("reset from {}", self.session.state);
        self.clear_stored_alarm();
        self.to_idle();
        true
    }

    /// Appends a photo to the pool. Photos can arrive at any time, including
    /// after the alarm has been armed; duplicates are ignored.
    pub fn add_photo(&mut self, photo: PhotoHandle) -> bool {
        if self.session.photos.contains(&photo) {
            return false;
        }
        self.session.photos.push(photo);
        self.save_photos();
        true
    }

    pub fn remove_photo(&mut self, index: usize) -> Option<PhotoHandle> {
        if self.session.state != LifecycleState::Idle || index >= self.session.photos.len() {
            return None;
        }
        let photo = self.session.photos.remove(index);
        self.save_photos();
        Some(photo)
    }

    pub fn clear_photos(&mut self) -> bool {
        if self.session.state != LifecycleState::Idle {
            return false;
        }
        self.session.photos.clear();
        self.save_photos();
        true
    }

    /// Stops any running timer. Called when the driver goes away.
    pub fn shutdown(&mut self) {
        if let Some(timer) = self.session.timer.take() {
            log::debug!("stopped {timer:?} on shutdown");
        }
    }

    fn enter_armed(&mut self, time: AlarmTime, now: NaiveDateTime) {
        let target = time.next_fire_after(now);
        self.session.state = LifecycleState::Armed;
        self.session.armed_time = Some(time);
        self.session.target = Some(target);
        self.session.seconds_until_alarm = seconds_until(target, now);
        self.session.seconds_until_penalty = self.policy.penalty_seconds;
        self.session.selected_photo = None;
        self.session.disclosed = false;
        self.session.timer = Some(Timer::AlarmPoll);
        info!("alarm armed for {target}");
    }

    fn start_round(&mut self) {
        self.session.state = LifecycleState::Ringing;
        self.session.selected_photo = self.pick_photo();
        self.session.seconds_until_alarm = 0;
        self.session.seconds_until_penalty = self.policy.penalty_seconds;
        self.session.disclosed = false;
        self.session.timer = Some(Timer::RingingCountdown);
    }

    fn pick_photo(&mut self) -> Option<PhotoHandle> {
        if self.session.photos.is_empty() {
            warn!("nothing to pick a penalty photo from");
            return None;
        }
        let index = self.rng.gen_range(0..self.session.photos.len());
        self.session.photos.get(index).cloned()
    }

    /// Returns true when the countdown reaches zero on this tick.
    fn count_down(&mut self) -> bool {
        self.session.seconds_until_penalty = self.session.seconds_until_penalty.saturating_sub(1);
        self.session.seconds_until_penalty == 0
    }

    fn disclose(&mut self) -> Option<Event> {
        self.session.disclosed = true;
        self.session.timer = None;
        let photo = self.session.selected_photo.clone()?;
        // sharing is not implemented, the photo only counts as sent
        info!("{photo} would have been sent now");
        Some(Event::Disclosed(photo))
    }

    fn to_idle(&mut self) {
        self.session = AlarmSession {
            photos: std::mem::take(&mut self.session.photos),
            seconds_until_penalty: self.policy.penalty_seconds,
            ..AlarmSession::default()
        };
    }

    fn clear_stored_alarm(&mut self) {
        if let Err(e) = self.store.clear_alarm() {
            self.note_store_error("clear the alarm", &e);
        }
    }

    fn save_photos(&mut self) {
        if let Err(e) = self.store.save_photos(&self.session.photos) {
            self.note_store_error("save photos", &e);
        }
    }

    fn note_store_error(&mut self, action: &str, error: &StoreError) {
        warn!("couldn't {action}: {error}");
        if error.is_unavailable() && !self.degraded {
            warn!("storage unavailable, continuing in memory only");
            self.degraded = true;
        }
    }
}
