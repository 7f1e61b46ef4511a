use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::problem::InstanceCounts;
use crate::reader::LineReader;

/// One depot-to-depot excursion: `[0, c1, c2, ..., 0]`.
pub type Trip = Vec<usize>;

/// The trips of every vehicle, indexed by vehicle id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteSet {
    pub truck_paths: Vec<Vec<Trip>>,
    pub drone_paths: Vec<Vec<Trip>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TripState {
    AwaitingTrip,
    InTrip,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TripAction {
    /// Start a new trip `[0]`.
    Open,
    /// Append a customer to the open trip.
    Visit(usize),
    /// Append the closing depot to the open trip.
    Close,
}

impl TripState {
    /// Transition table of the token decoder. Token `0` is the depot.
    ///
    /// | state        | depot                 | customer `c`            |
    /// |--------------|-----------------------|-------------------------|
    /// | AwaitingTrip | InTrip, `Open`        | malformed stream        |
    /// | InTrip       | AwaitingTrip, `Close` | InTrip, `Visit(c)`      |
    pub fn transition(self, token: usize) -> Result<(Self, TripAction), Error> {
        match (self, token) {
            (Self::AwaitingTrip, 0) => Ok((Self::InTrip, TripAction::Open)),
            (Self::InTrip, 0) => Ok((Self::AwaitingTrip, TripAction::Close)),
            (Self::InTrip, customer) => Ok((Self::InTrip, TripAction::Visit(customer))),
            (Self::AwaitingTrip, customer) => Err(Error::format(format!(
                "Customer {customer} appears outside of any trip"
            ))),
        }
    }
}

/// Incremental decoder of one vehicle's token stream.
#[derive(Debug)]
pub struct TripDecoder {
    state: TripState,
    trips: Vec<Trip>,
    customers_count: usize,
}

impl TripDecoder {
    pub fn new(customers_count: usize) -> Self {
        Self {
            state: TripState::AwaitingTrip,
            trips: vec![],
            customers_count,
        }
    }

    pub fn feed(&mut self, token: usize) -> Result<(), Error> {
        let (state, action) = self.state.transition(token)?;
        match action {
            TripAction::Open => self.trips.push(vec![0]),
            TripAction::Visit(customer) => {
                if customer > self.customers_count {
                    return Err(Error::format(format!(
                        "Customer {customer} is out of range 1..={}",
                        self.customers_count
                    )));
                }

                // `InTrip` guarantees an open trip
                if let Some(trip) = self.trips.last_mut() {
                    trip.push(customer);
                }
            }
            TripAction::Close => {
                if let Some(trip) = self.trips.last_mut() {
                    trip.push(0);
                }
            }
        }

        self.state = state;
        Ok(())
    }

    /// A well-formed stream ends with every trip closed.
    pub fn finish(self) -> Result<Vec<Trip>, Error> {
        match self.state {
            TripState::AwaitingTrip => Ok(self.trips),
            TripState::InTrip => Err(Error::format(format!(
                "Token stream ends inside trip {:?}",
                self.trips.last().cloned().unwrap_or_default()
            ))),
        }
    }
}

pub fn decode_trips(tokens: &[usize], customers_count: usize) -> Result<Vec<Trip>, Error> {
    let mut decoder = TripDecoder::new(customers_count);
    for &token in tokens {
        decoder.feed(token)?;
    }

    decoder.finish()
}

impl RouteSet {
    /// Read one token line per vehicle, all trucks first, then all drones.
    pub fn read<R: BufRead>(reader: &mut LineReader<R>, counts: InstanceCounts) -> Result<Self, Error> {
        let mut _read_vehicles = |count: usize, vehicle: &str| -> Result<Vec<Vec<Trip>>, Error> {
            (0..count)
                .map(|i| {
                    let tokens = reader.parse_all::<usize>(&format!("{vehicle} #{i} route tokens"))?;
                    decode_trips(&tokens, counts.customers_count)
                })
                .collect()
        };

        let truck_paths = _read_vehicles(counts.trucks_count, "truck")?;
        let drone_paths = _read_vehicles(counts.drones_count, "drone")?;
        Ok(Self {
            truck_paths,
            drone_paths,
        })
    }

    pub fn trips_count(&self) -> usize {
        self.truck_paths
            .iter()
            .chain(self.drone_paths.iter())
            .map(|trips| trips.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_decode_consecutive_trips() {
        let trips = decode_trips(&[0, 1, 2, 0, 0, 3, 0], 3).unwrap();
        assert_eq!(trips, vec![vec![0, 1, 2, 0], vec![0, 3, 0]]);
    }

    #[test]
    fn can_decode_idle_vehicle() {
        assert!(decode_trips(&[], 3).unwrap().is_empty());
    }

    #[test]
    fn can_reject_unclosed_trip() {
        assert!(matches!(decode_trips(&[0, 1, 2], 3), Err(Error::Format(_))));
    }

    #[test]
    fn can_reject_customer_outside_trip() {
        assert!(matches!(decode_trips(&[1, 0], 3), Err(Error::Format(_))));
        assert!(matches!(decode_trips(&[0, 1, 0, 2, 0], 3), Err(Error::Format(_))));
    }

    #[test]
    fn can_reject_unknown_customer() {
        assert!(matches!(decode_trips(&[0, 4, 0], 3), Err(Error::Format(_))));
    }

    #[test]
    fn can_follow_transition_table() {
        assert_eq!(
            TripState::AwaitingTrip.transition(0).unwrap(),
            (TripState::InTrip, TripAction::Open)
        );
        assert_eq!(
            TripState::InTrip.transition(5).unwrap(),
            (TripState::InTrip, TripAction::Visit(5))
        );
        assert_eq!(
            TripState::InTrip.transition(0).unwrap(),
            (TripState::AwaitingTrip, TripAction::Close)
        );
        assert!(TripState::AwaitingTrip.transition(5).is_err());

        let mut decoder = TripDecoder::new(2);
        decoder.feed(0).unwrap();
        decoder.feed(2).unwrap();
        assert!(matches!(decoder.finish(), Err(Error::Format(_))));
    }

    #[test]
    fn can_decode_idempotently() {
        let tokens = [0, 2, 0, 0, 1, 3, 0];
        assert_eq!(decode_trips(&tokens, 3).unwrap(), decode_trips(&tokens, 3).unwrap());
    }

    #[test]
    fn can_read_trucks_then_drones() {
        let counts = InstanceCounts {
            customers_count: 4,
            trucks_count: 2,
            drones_count: 1,
        };
        let mut reader = LineReader::new("0 1 0\n\n0 2 0 0 3 0\n0 4 0\n".as_bytes());

        let routes = RouteSet::read(&mut reader, counts).unwrap();
        assert_eq!(routes.truck_paths, vec![vec![vec![0, 1, 0]], vec![]]);
        assert_eq!(routes.drone_paths, vec![vec![vec![0, 2, 0], vec![0, 3, 0]]]);
        assert_eq!(routes.trips_count(), 3);

        // Exactly one line per vehicle is consumed
        assert_eq!(reader.next_line("rest").unwrap(), "0 4 0");
    }

    #[test]
    fn can_reject_missing_vehicle_line() {
        let counts = InstanceCounts {
            customers_count: 1,
            trucks_count: 1,
            drones_count: 1,
        };
        let mut reader = LineReader::new("0 1 0\n".as_bytes());
        assert!(matches!(RouteSet::read(&mut reader, counts), Err(Error::Format(_))));
    }
}
