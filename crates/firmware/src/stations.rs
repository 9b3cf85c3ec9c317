//! Station presets.
//!
//! A fixed table baked into flash; the UI cycles through it with the
//! previous/next buttons. Entries wrap at both ends.

/// One Icecast mountpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Station {
    /// Display name.
    pub name: &'static str,
    /// Server host name.
    pub host: &'static str,
    /// TCP port.
    pub port: u16,
    /// Mountpoint path, leading slash included.
    pub path: &'static str,
}

/// Preset table.
pub const STATIONS: &[Station] = &[
    Station {
        name: "N-JOY",
        host: "ndr-njoy-live.cast.addradio.de",
        port: 80,
        path: "/ndr/njoy/live/mp3/128/stream.mp3",
    },
    Station {
        name: "Antenne Bayern",
        host: "r.ezbt.me",
        port: 80,
        path: "/antenne",
    },
];

/// Cursor into [`STATIONS`] with wrap-around stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationCycle {
    index: usize,
}

impl StationCycle {
    /// Cursor at the first preset.
    pub const fn new() -> Self {
        Self { index: 0 }
    }

    /// Currently selected station.
    pub fn current(&self) -> &'static Station {
        // Index stays in range through the wrapping step functions.
        #[allow(clippy::indexing_slicing)] // STATIONS is a non-empty const table
        STATIONS.get(self.index).unwrap_or(&STATIONS[0])
    }

    /// Step forward, wrapping to the first entry after the last.
    pub fn next(&mut self) -> &'static Station {
        self.index = self.index.saturating_add(1) % STATIONS.len();
        self.current()
    }

    /// Step backward, wrapping to the last entry before the first.
    pub fn prev(&mut self) -> &'static Station {
        self.index = self
            .index
            .checked_sub(1)
            .unwrap_or(STATIONS.len().saturating_sub(1));
        self.current()
    }
}

impl Default for StationCycle {
    fn default() -> Self {
        Self::new()
    }
}
