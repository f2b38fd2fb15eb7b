//! Job state enum mapping to the SMALLINT `job_states` lookup table.
//!
//! Variant discriminants match the seed data in the initial migration.
//! `Paused` and `Unknown` are reported states only: `Paused` is derived at
//! read time for waiting jobs on a paused queue, `Unknown` stands for a
//! missing row. Neither is ever written to the database.

/// State ID type matching SMALLINT in the database.
pub type StateId = i16;

macro_rules! define_state_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database state ID.
            pub fn id(self) -> StateId {
                self as StateId
            }

            /// Map a database state ID back to the enum.
            pub fn from_id(id: StateId) -> Self {
                match id {
                    $( $val => $name::$variant, )+
                    _ => $name::Unknown,
                }
            }
        }

        impl From<$name> for StateId {
            fn from(value: $name) -> Self {
                value as StateId
            }
        }
    };
}

define_state_enum! {
    /// Background job lifecycle state.
    JobState {
        /// Reported for a key with no matching row. Never stored.
        Unknown = 0,
        Waiting = 1,
        Active = 2,
        Delayed = 3,
        Completed = 4,
        Failed = 5,
        /// Reported for waiting jobs on a paused queue. Never stored.
        Paused = 6,
    }
}

impl JobState {
    /// Lowercase state name as seeded in `job_states`.
    pub fn name(self) -> &'static str {
        match self {
            JobState::Unknown => "unknown",
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Delayed => "delayed",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Paused => "paused",
        }
    }

    /// True for states a job can never leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_ids_match_seed_data() {
        assert_eq!(JobState::Waiting.id(), 1);
        assert_eq!(JobState::Active.id(), 2);
        assert_eq!(JobState::Delayed.id(), 3);
        assert_eq!(JobState::Completed.id(), 4);
        assert_eq!(JobState::Failed.id(), 5);
        assert_eq!(JobState::Paused.id(), 6);
    }

    #[test]
    fn from_id_round_trips_stored_states() {
        for state in [
            JobState::Waiting,
            JobState::Active,
            JobState::Delayed,
            JobState::Completed,
            JobState::Failed,
        ] {
            assert_eq!(JobState::from_id(state.id()), state);
        }
    }

    #[test]
    fn from_id_maps_out_of_range_to_unknown() {
        assert_eq!(JobState::from_id(42), JobState::Unknown);
        assert_eq!(JobState::from_id(-1), JobState::Unknown);
    }

    #[test]
    fn display_uses_the_seeded_name() {
        assert_eq!(JobState::Completed.to_string(), "completed");
        assert_eq!(JobState::Unknown.to_string(), "unknown");
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Waiting.is_terminal());
        assert!(!JobState::Active.is_terminal());
        assert!(!JobState::Delayed.is_terminal());
        assert!(!JobState::Paused.is_terminal());
        assert!(!JobState::Unknown.is_terminal());
    }
}
