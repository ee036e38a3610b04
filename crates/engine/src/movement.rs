//! Player movement: discrete button steps or a real-world position watch.
//!
//! Exactly one strategy is active at a time. Switching always tears the old
//! one down before the new one starts, and every geolocation activation gets a
//! fresh watch number so late samples from a stopped watch can be told apart.

use tracing::{debug, info, warn};
use worldofbits_protocol::{
    ClientDirective, Direction, LatLng, MovementMode, PositionErrorCode, PositionSample,
};

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance between two coordinates, in meters.
pub fn great_circle_meters(a: LatLng, b: LatLng) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// One button step. Latitude stops at the poles; longitude wraps across the
/// antimeridian so the result is always on the map.
pub fn step(pos: LatLng, direction: Direction, degrees: f64) -> LatLng {
    let moved = match direction {
        Direction::North => LatLng::new(pos.lat + degrees, pos.lng),
        Direction::South => LatLng::new(pos.lat - degrees, pos.lng),
        Direction::East => LatLng::new(pos.lat, pos.lng + degrees),
        Direction::West => LatLng::new(pos.lat, pos.lng - degrees),
    };
    LatLng::new(moved.lat.clamp(-90.0, 90.0), wrap_lng(moved.lng))
}

fn wrap_lng(lng: f64) -> f64 {
    if lng > 180.0 {
        lng - 360.0
    } else if lng < -180.0 {
        lng + 360.0
    } else {
        lng
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeolocationWatch {
    pub id: u64,
    last_accepted: Option<LatLng>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    Idle,
    Buttons,
    Geolocation(GeolocationWatch),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// The input belongs to a strategy that is not running.
    Inactive,
    /// The sample came from a watch that has since been stopped.
    Stale,
    /// Too close to the last accepted sample.
    Jitter,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    Accepted(LatLng),
    Ignored(Ignored),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorOutcome {
    pub message: String,
    /// Set when the error forced a fallback to button movement.
    pub directives: Vec<ClientDirective>,
}

#[derive(Debug, Clone)]
pub struct MovementController {
    strategy: Strategy,
    last_watch: u64,
}

impl Default for MovementController {
    fn default() -> Self {
        Self::new()
    }
}

impl MovementController {
    pub fn new() -> Self {
        Self {
            strategy: Strategy::Idle,
            last_watch: 0,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Mode of the running strategy; idle reports buttons.
    pub fn mode(&self) -> MovementMode {
        match self.strategy {
            Strategy::Geolocation(_) => MovementMode::Geolocation,
            Strategy::Idle | Strategy::Buttons => MovementMode::Buttons,
        }
    }

    pub fn stop(&mut self) -> Vec<ClientDirective> {
        let directives = match self.strategy {
            Strategy::Idle => Vec::new(),
            Strategy::Buttons => vec![ClientDirective::HideMovementButtons],
            Strategy::Geolocation(watch) => {
                debug!(watch = watch.id, "stopping geolocation watch");
                vec![ClientDirective::StopGeolocationWatch]
            }
        };
        self.strategy = Strategy::Idle;
        directives
    }

    /// Stops whatever runs and starts `mode`.
    pub fn switch_to(&mut self, mode: MovementMode) -> Vec<ClientDirective> {
        let mut directives = self.stop();
        match mode {
            MovementMode::Buttons => {
                self.strategy = Strategy::Buttons;
                directives.push(ClientDirective::ShowMovementButtons);
            }
            MovementMode::Geolocation => {
                self.last_watch += 1;
                self.strategy = Strategy::Geolocation(GeolocationWatch {
                    id: self.last_watch,
                    last_accepted: None,
                });
                directives.push(ClientDirective::StartGeolocationWatch {
                    watch: self.last_watch,
                });
            }
        }
        info!(mode = mode.as_str(), "movement strategy started");
        directives
    }

    /// New position for a button press, or `None` if buttons are not active.
    pub fn on_step(&self, pos: LatLng, direction: Direction, degrees: f64) -> Option<LatLng> {
        match self.strategy {
            Strategy::Buttons => Some(step(pos, direction, degrees)),
            _ => None,
        }
    }

    pub fn on_sample(&mut self, sample: PositionSample, hysteresis_meters: f64) -> SampleOutcome {
        let Strategy::Geolocation(watch) = &mut self.strategy else {
            return SampleOutcome::Ignored(Ignored::Inactive);
        };
        if sample.watch != watch.id {
            return SampleOutcome::Ignored(Ignored::Stale);
        }
        if let Some(last) = watch.last_accepted {
            if great_circle_meters(last, sample.lat_lng) <= hysteresis_meters {
                return SampleOutcome::Ignored(Ignored::Jitter);
            }
        }
        watch.last_accepted = Some(sample.lat_lng);
        SampleOutcome::Accepted(sample.lat_lng)
    }

    /// Handles a failure reported by the position watch. Returns `None` for
    /// errors from a watch that is no longer running.
    pub fn on_error(&mut self, code: PositionErrorCode, watch: u64) -> Option<ErrorOutcome> {
        match self.strategy {
            Strategy::Geolocation(active) if active.id == watch => {}
            _ => return None,
        }
        warn!(?code, watch, "geolocation error");
        let outcome = match code {
            PositionErrorCode::PermissionDenied => ErrorOutcome {
                message: "Location permission denied; switched to button movement.".to_string(),
                directives: self.switch_to(MovementMode::Buttons),
            },
            PositionErrorCode::Unavailable => ErrorOutcome {
                message: "Location unavailable.".to_string(),
                directives: Vec::new(),
            },
            PositionErrorCode::Timeout => ErrorOutcome {
                message: "Location request timed out.".to_string(),
                directives: Vec::new(),
            },
        };
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(lat: f64, lng: f64, watch: u64) -> PositionSample {
        PositionSample {
            lat_lng: LatLng::new(lat, lng),
            accuracy: 5.0,
            watch,
        }
    }

    #[test]
    fn haversine_matches_known_distances() {
        let a = LatLng::new(0.0, 0.0);
        let one_degree = great_circle_meters(a, LatLng::new(0.0, 1.0));
        assert!((one_degree - 111_194.9).abs() < 1.0, "{one_degree}");
        assert_eq!(great_circle_meters(a, a), 0.0);
        let cell = great_circle_meters(a, LatLng::new(1e-4, 0.0));
        assert!((cell - 11.12).abs() < 0.05, "{cell}");
    }

    #[test]
    fn steps_move_one_axis() {
        let p = LatLng::new(1.0, 2.0);
        assert_eq!(step(p, Direction::North, 0.5), LatLng::new(1.5, 2.0));
        assert_eq!(step(p, Direction::South, 0.5), LatLng::new(0.5, 2.0));
        assert_eq!(step(p, Direction::East, 0.5), LatLng::new(1.0, 2.5));
        assert_eq!(step(p, Direction::West, 0.5), LatLng::new(1.0, 1.5));
    }

    #[test]
    fn steps_stay_on_the_map() {
        let pole = step(LatLng::new(89.99995, 10.0), Direction::North, 1e-4);
        assert_eq!(pole, LatLng::new(90.0, 10.0));
        let south = step(LatLng::new(-90.0, 10.0), Direction::South, 1e-4);
        assert_eq!(south, LatLng::new(-90.0, 10.0));

        let east = step(LatLng::new(0.0, 179.99995), Direction::East, 1e-4);
        assert!((east.lng + 179.99995).abs() < 1e-9, "{east:?}");
        let west = step(LatLng::new(0.0, -180.0), Direction::West, 1e-4);
        assert!((west.lng - 179.9999).abs() < 1e-9, "{west:?}");
    }

    #[test]
    fn switching_tears_down_before_setup() {
        let mut m = MovementController::new();
        assert_eq!(
            m.switch_to(MovementMode::Buttons),
            vec![ClientDirective::ShowMovementButtons]
        );
        assert_eq!(
            m.switch_to(MovementMode::Geolocation),
            vec![
                ClientDirective::HideMovementButtons,
                ClientDirective::StartGeolocationWatch { watch: 1 },
            ]
        );
        assert_eq!(
            m.switch_to(MovementMode::Buttons),
            vec![
                ClientDirective::StopGeolocationWatch,
                ClientDirective::ShowMovementButtons,
            ]
        );
        assert_eq!(m.stop(), vec![ClientDirective::HideMovementButtons]);
        assert_eq!(m.strategy(), Strategy::Idle);
    }

    #[test]
    fn inputs_for_inactive_strategies_are_dropped() {
        let mut m = MovementController::new();
        m.switch_to(MovementMode::Geolocation);
        assert_eq!(m.on_step(LatLng::new(0.0, 0.0), Direction::North, 1e-4), None);

        m.switch_to(MovementMode::Buttons);
        assert_eq!(
            m.on_sample(sample(0.0, 0.0, 1), 5.0),
            SampleOutcome::Ignored(Ignored::Inactive)
        );
        assert!(m.on_step(LatLng::new(0.0, 0.0), Direction::North, 1e-4).is_some());
    }

    #[test]
    fn stale_watch_samples_are_dropped() {
        let mut m = MovementController::new();
        m.switch_to(MovementMode::Geolocation);
        m.switch_to(MovementMode::Buttons);
        m.switch_to(MovementMode::Geolocation);
        assert_eq!(
            m.on_sample(sample(1.0, 1.0, 1), 5.0),
            SampleOutcome::Ignored(Ignored::Stale)
        );
        assert_eq!(
            m.on_sample(sample(1.0, 1.0, 2), 5.0),
            SampleOutcome::Accepted(LatLng::new(1.0, 1.0))
        );
        assert!(m.on_error(PositionErrorCode::Timeout, 1).is_none());
    }

    #[test]
    fn hysteresis_filters_jitter() {
        let mut m = MovementController::new();
        m.switch_to(MovementMode::Geolocation);
        assert!(matches!(m.on_sample(sample(0.0, 0.0, 1), 5.0), SampleOutcome::Accepted(_)));
        // ~1.1 m
        assert_eq!(
            m.on_sample(sample(0.00001, 0.0, 1), 5.0),
            SampleOutcome::Ignored(Ignored::Jitter)
        );
        // ~3.3 m, still measured from the first accepted sample
        assert_eq!(
            m.on_sample(sample(0.00003, 0.0, 1), 5.0),
            SampleOutcome::Ignored(Ignored::Jitter)
        );
        // ~11 m
        assert_eq!(
            m.on_sample(sample(0.0001, 0.0, 1), 5.0),
            SampleOutcome::Accepted(LatLng::new(0.0001, 0.0))
        );
    }

    #[test]
    fn permission_denied_falls_back_to_buttons() {
        let mut m = MovementController::new();
        m.switch_to(MovementMode::Geolocation);

        let timeout = m.on_error(PositionErrorCode::Timeout, 1).unwrap();
        assert!(timeout.directives.is_empty());
        assert_eq!(m.mode(), MovementMode::Geolocation);

        let denied = m.on_error(PositionErrorCode::PermissionDenied, 1).unwrap();
        assert_eq!(
            denied.directives,
            vec![
                ClientDirective::StopGeolocationWatch,
                ClientDirective::ShowMovementButtons,
            ]
        );
        assert_eq!(m.mode(), MovementMode::Buttons);
    }
}
