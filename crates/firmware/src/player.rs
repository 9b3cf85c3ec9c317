//! Player state machine.
//!
//! Pure state: button presses come in, [`PlayerAction`]s come out, and the
//! task layer turns actions into stream stop/start sequences and codec
//! writes. Keeping the transitions free of I/O makes them host-testable.

use platform::wm8731::{VOL_0DB, VOL_MAX, VOL_MIN};

use crate::stations::{Station, StationCycle};

/// Startup listening level, comfortably below 0 dB.
pub const VOL_DEFAULT: u8 = VOL_0DB - 24;

/// What the task layer must do after a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlayerAction {
    /// Start streaming `station`; nothing was playing.
    Start(&'static Station),
    /// Stop the running stream first, then start `station`.
    Restart(&'static Station),
    /// Stop the running stream.
    Stop,
    /// Program the codec headphone attenuator.
    Volume(u8),
}

/// Station selection, pause state, and volume.
pub struct Player {
    cycle: StationCycle,
    paused: bool,
    volume: u8,
}

impl Player {
    /// Paused at the first preset, default volume.
    pub const fn new() -> Self {
        Self {
            cycle: StationCycle::new(),
            paused: true,
            volume: VOL_DEFAULT,
        }
    }

    /// Whether a stream is currently supposed to run.
    pub fn playing(&self) -> bool {
        !self.paused
    }

    /// Selected station.
    pub fn station(&self) -> &'static Station {
        self.cycle.current()
    }

    /// Current volume in codec units.
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Step to the next preset. Always results in playback.
    pub fn next_station(&mut self) -> PlayerAction {
        let station = self.cycle.next();
        self.switch(station)
    }

    /// Step to the previous preset. Always results in playback.
    pub fn prev_station(&mut self) -> PlayerAction {
        let station = self.cycle.prev();
        self.switch(station)
    }

    fn switch(&mut self, station: &'static Station) -> PlayerAction {
        let was_playing = !self.paused;
        self.paused = false;
        if was_playing {
            PlayerAction::Restart(station)
        } else {
            PlayerAction::Start(station)
        }
    }

    /// Toggle between playing and paused.
    pub fn play_pause(&mut self) -> PlayerAction {
        self.paused = !self.paused;
        if self.paused {
            PlayerAction::Stop
        } else {
            PlayerAction::Start(self.cycle.current())
        }
    }

    /// One step louder, clamped to the codec maximum.
    pub fn volume_up(&mut self) -> PlayerAction {
        self.volume = self.volume.saturating_add(1).min(VOL_MAX);
        PlayerAction::Volume(self.volume)
    }

    /// One step quieter, clamped to the codec mute threshold.
    pub fn volume_down(&mut self) -> PlayerAction {
        self.volume = self.volume.saturating_sub(1).max(VOL_MIN);
        PlayerAction::Volume(self.volume)
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}
