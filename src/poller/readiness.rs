//! Readiness event masks for descriptor polling

use bitflags::bitflags;

bitflags! {
    /// Readiness events on a polled descriptor, mirroring `poll(2)` bits.
    ///
    /// Used both as the interest mask when registering a descriptor and as
    /// the observed mask handed to dispatch callbacks. `ERROR`, `HANGUP`
    /// and `INVALID` are output-only: `poll(2)` reports them regardless of
    /// the registered interest.
    ///
    /// # Example
    ///
    /// ```
    /// use audio_offload::poller::Readiness;
    ///
    /// let interest = Readiness::READABLE | Readiness::PRIORITY;
    /// assert!(interest.contains(Readiness::READABLE));
    /// assert!(!interest.contains(Readiness::WRITABLE));
    /// ```
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Readiness: i16 {
        /// Data is available to read (`POLLIN`)
        const READABLE = libc::POLLIN;
        /// Urgent out-of-band data is available (`POLLPRI`)
        const PRIORITY = libc::POLLPRI;
        /// Writing will not block (`POLLOUT`)
        const WRITABLE = libc::POLLOUT;
        /// An error condition was reported (`POLLERR`)
        const ERROR = libc::POLLERR;
        /// The peer hung up (`POLLHUP`)
        const HANGUP = libc::POLLHUP;
        /// The descriptor is not open (`POLLNVAL`)
        const INVALID = libc::POLLNVAL;
    }
}

impl Readiness {
    /// The default interest mask for new registrations: readable data,
    /// urgent data included.
    pub fn input() -> Self {
        Readiness::READABLE | Readiness::PRIORITY
    }

    /// Build a mask from the `revents` field of a `pollfd`, discarding any
    /// bits this crate does not model.
    pub fn from_revents(revents: libc::c_short) -> Self {
        Readiness::from_bits_truncate(revents)
    }

    /// The raw bits to place in the `events` field of a `pollfd`.
    pub fn interest_bits(self) -> libc::c_short {
        self.bits()
    }

    /// Whether any of the data bits (readable, urgent, writable) are set.
    pub fn has_data(self) -> bool {
        self.intersects(Readiness::READABLE | Readiness::PRIORITY | Readiness::WRITABLE)
    }

    /// Whether the error bit is set.
    pub fn is_error(self) -> bool {
        self.contains(Readiness::ERROR)
    }

    /// Whether the hangup bit is set.
    pub fn is_hangup(self) -> bool {
        self.contains(Readiness::HANGUP)
    }

    /// Whether the invalid-descriptor bit is set.
    pub fn is_invalid(self) -> bool {
        self.contains(Readiness::INVALID)
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Readiness::input()
    }
}
