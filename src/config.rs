use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{DeserializeOwned, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::cli::{ConfigType, EnergyModel};
use crate::errors::Error;

pub const TRUCK_DATASET: &str = "truck_config.json";
pub const DRONE_LINEAR_DATASET: &str = "drone_linear_config.json";
pub const DRONE_NONLINEAR_DATASET: &str = "drone_nonlinear_config.json";
pub const DRONE_ENDURANCE_DATASET: &str = "drone_endurance_config.json";

/// Accept the coefficients either as a list or as an object whose values are taken in document order.
fn _deserialize_coefficients<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct CoefficientsVisitor;
    impl<'de> Visitor<'de> for CoefficientsVisitor {
        type Value = Vec<f64>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a list or an object of coefficients")
        }

        fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
        where
            S: SeqAccess<'de>,
        {
            let mut result = vec![];
            while let Some(value) = seq.next_element::<f64>()? {
                result.push(value);
            }

            Ok(result)
        }

        fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
        where
            M: MapAccess<'de>,
        {
            let mut result = vec![];
            while let Some((_, value)) = map.next_entry::<String, f64>()? {
                result.push(value);
            }

            Ok(result)
        }
    }

    deserializer.deserialize_any(CoefficientsVisitor)
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TruckConfig {
    #[serde(rename = "V_max (m/s)")]
    pub maximum_velocity: f64,

    #[serde(rename = "M_t (kg)")]
    pub capacity: f64,

    #[serde(rename = "T (hour)", deserialize_with = "_deserialize_coefficients")]
    pub coefficients: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct VariableSpeedJSON {
    #[serde(rename = "capacity [kg]")]
    pub capacity: f64,

    pub speed_type: ConfigType,

    #[serde(rename = "range", alias = "range_type")]
    pub range_type: ConfigType,

    #[serde(rename = "takeoffSpeed [m/s]")]
    pub takeoff_speed: f64,

    #[serde(rename = "cruiseSpeed [m/s]")]
    pub cruise_speed: f64,

    #[serde(rename = "landingSpeed [m/s]")]
    pub landing_speed: f64,

    #[serde(rename = "cruiseAlt [m]")]
    pub altitude: f64,

    #[serde(rename = "batteryPower [Joule]")]
    pub battery: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DroneLinearConfig {
    #[serde(flatten)]
    pub base: VariableSpeedJSON,

    #[serde(rename = "beta(w/kg)")]
    pub beta: f64,

    #[serde(rename = "gamma(w)")]
    pub gamma: f64,
}

/// Coefficients of the nonlinear model, shared by every record of the dataset.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NonlinearCoefficients {
    pub k1: f64,

    #[serde(rename = "k2 (sqrt(kg/m))", alias = "k2 (sqrt(kg/m)")]
    pub k2: f64,

    #[serde(rename = "c1 (sqrt(m/kg))", alias = "c1 (sqrt(m/kg)")]
    pub c1: f64,

    #[serde(rename = "c2 (sqrt(m/kg))", alias = "c2 (sqrt(m/kg)")]
    pub c2: f64,

    #[serde(rename = "c4 (kg/m)")]
    pub c4: f64,

    #[serde(rename = "c5 (Ns/m)")]
    pub c5: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DroneNonlinearConfig {
    #[serde(flatten)]
    pub base: VariableSpeedJSON,

    #[serde(flatten)]
    pub coefficients: NonlinearCoefficients,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DroneEnduranceConfig {
    #[serde(rename = "capacity [kg]")]
    pub capacity: f64,

    pub speed_type: ConfigType,

    #[serde(rename = "range", alias = "range_type")]
    pub range_type: ConfigType,

    #[serde(rename = "FixedTime (s)")]
    pub fixed_time: f64,

    #[serde(rename = "FixedDistance (m)")]
    pub fixed_distance: f64,

    #[serde(rename = "Drone_speed (m/s)", alias = "V_max (m/s)")]
    pub drone_speed: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "config")]
pub enum DroneConfig {
    Linear(DroneLinearConfig),
    NonLinear(DroneNonlinearConfig),
    Endurance(DroneEnduranceConfig),
}

/// Exactly one configuration per vehicle class is active during a run.
#[derive(Clone, Debug, PartialEq)]
pub enum VehicleConfig {
    Truck(TruckConfig),
    Drone(DroneConfig),
}

trait SpeedRangeTyped {
    fn speed_type(&self) -> ConfigType;
    fn range_type(&self) -> ConfigType;
}

impl SpeedRangeTyped for DroneLinearConfig {
    fn speed_type(&self) -> ConfigType {
        self.base.speed_type
    }

    fn range_type(&self) -> ConfigType {
        self.base.range_type
    }
}

impl SpeedRangeTyped for DroneNonlinearConfig {
    fn speed_type(&self) -> ConfigType {
        self.base.speed_type
    }

    fn range_type(&self) -> ConfigType {
        self.base.range_type
    }
}

impl SpeedRangeTyped for DroneEnduranceConfig {
    fn speed_type(&self) -> ConfigType {
        self.speed_type
    }

    fn range_type(&self) -> ConfigType {
        self.range_type
    }
}

/// A named configuration from one dataset.
pub type Named<T> = (String, T);

fn _read_dataset(path: &Path) -> Result<Value, Error> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str::<Value>(&data)
        .map_err(|e| Error::format(format!("Invalid dataset {}: {e}", path.display())))
}

fn _record<T: DeserializeOwned>(name: &str, value: Value) -> Result<T, Error> {
    serde_json::from_value::<T>(value).map_err(|e| Error::configuration(format!("Config {name:?}: {e}")))
}

/// Split a dataset container into its named records.
///
/// When `skip_scalars` is set, entries that are not field-mappings (shared metadata) are ignored instead of
/// failing the whole load.
fn _records(value: Value, skip_scalars: bool) -> Result<Vec<Named<Value>>, Error> {
    let entries: Vec<Named<Value>> = match value {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (i.to_string(), item))
            .collect(),
        other => return Err(Error::format(format!("Expected a dataset container, found {other}"))),
    };

    let mut results = vec![];
    for (name, entry) in entries {
        match entry {
            Value::Object(_) => results.push((name, entry)),
            // A nested list of records (e.g. `"config": [...]`)
            Value::Array(items) if skip_scalars => {
                for (i, item) in items.into_iter().enumerate() {
                    if item.is_object() {
                        results.push((format!("{name}.{i}"), item));
                    }
                }
            }
            _ if skip_scalars => {}
            _ => {
                return Err(Error::configuration(format!("Config {name:?} is not a field mapping")));
            }
        }
    }

    Ok(results)
}

fn _select<T>(entries: Vec<Named<T>>, speed_type: ConfigType, range_type: ConfigType, dataset: &str) -> Result<T, Error>
where
    T: SpeedRangeTyped,
{
    entries
        .into_iter()
        .map(|(_, config)| config)
        .find(|config| config.speed_type() == speed_type && config.range_type() == range_type)
        .ok_or_else(|| {
            Error::configuration(format!(
                "No {dataset} config with speed type {speed_type} and range type {range_type}"
            ))
        })
}

impl TruckConfig {
    fn _validate(self, name: &str) -> Result<Self, Error> {
        if self.coefficients.is_empty() {
            return Err(Error::configuration(format!("Truck config {name:?} has no coefficients")));
        }

        Ok(self)
    }

    /// Load a truck dataset, which is either a single record or a mapping of named records.
    pub fn import_data(path: &Path) -> Result<Vec<Named<Self>>, Error> {
        let value = _read_dataset(path)?;
        let single = matches!(&value, Value::Object(map) if map.contains_key("V_max (m/s)"));
        let entries = if single {
            vec![(String::from("truck"), value)]
        } else {
            _records(value, false)?
        };

        entries
            .into_iter()
            .map(|(name, value)| {
                let config = _record::<Self>(&name, value)?._validate(&name)?;
                Ok((name, config))
            })
            .collect()
    }

    pub fn load(config_dir: &Path) -> Result<Self, Error> {
        Self::import_data(&config_dir.join(TRUCK_DATASET))?
            .into_iter()
            .next()
            .map(|(_, config)| config)
            .ok_or_else(|| Error::configuration("Empty truck dataset"))
    }
}

impl DroneLinearConfig {
    pub fn import_data(path: &Path) -> Result<Vec<Named<Self>>, Error> {
        _records(_read_dataset(path)?, false)?
            .into_iter()
            .map(|(name, value)| Ok((name.clone(), _record::<Self>(&name, value)?)))
            .collect()
    }
}

impl DroneNonlinearConfig {
    pub fn import_data(path: &Path) -> Result<Vec<Named<Self>>, Error> {
        let value = _read_dataset(path)?;
        let coefficients = match &value {
            Value::Object(map) => {
                let scalars = map
                    .iter()
                    .filter(|(_, v)| !v.is_object() && !v.is_array())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<Map<String, Value>>();
                _record::<NonlinearCoefficients>("nonlinear coefficients", Value::Object(scalars))?
            }
            _ => return Err(Error::format("Nonlinear dataset must be an object")),
        };

        _records(value, true)?
            .into_iter()
            .map(|(name, value)| {
                let base = _record::<VariableSpeedJSON>(&name, value)?;
                Ok((
                    name,
                    Self {
                        base,
                        coefficients: coefficients.clone(),
                    },
                ))
            })
            .collect()
    }
}

impl DroneEnduranceConfig {
    pub fn import_data(path: &Path) -> Result<Vec<Named<Self>>, Error> {
        _records(_read_dataset(path)?, false)?
            .into_iter()
            .map(|(name, value)| Ok((name.clone(), _record::<Self>(&name, value)?)))
            .collect()
    }
}

impl DroneConfig {
    /// Load the dataset of `model` from `config_dir` and pick the entry matching the speed and range types.
    pub fn load(
        config_dir: &Path,
        model: EnergyModel,
        speed_type: ConfigType,
        range_type: ConfigType,
    ) -> Result<Self, Error> {
        Ok(match model {
            EnergyModel::Linear => Self::Linear(_select(
                DroneLinearConfig::import_data(&config_dir.join(DRONE_LINEAR_DATASET))?,
                speed_type,
                range_type,
                "linear",
            )?),
            EnergyModel::NonLinear => Self::NonLinear(_select(
                DroneNonlinearConfig::import_data(&config_dir.join(DRONE_NONLINEAR_DATASET))?,
                speed_type,
                range_type,
                "non-linear",
            )?),
            EnergyModel::Endurance => Self::Endurance(_select(
                DroneEnduranceConfig::import_data(&config_dir.join(DRONE_ENDURANCE_DATASET))?,
                speed_type,
                range_type,
                "endurance",
            )?),
        })
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Linear(_) => "DroneLinearConfig",
            Self::NonLinear(_) => "DroneNonlinearConfig",
            Self::Endurance(_) => "DroneEnduranceConfig",
        }
    }

    pub fn energy_model(&self) -> EnergyModel {
        match self {
            Self::Linear(_) => EnergyModel::Linear,
            Self::NonLinear(_) => EnergyModel::NonLinear,
            Self::Endurance(_) => EnergyModel::Endurance,
        }
    }

    pub fn capacity(&self) -> f64 {
        match self {
            Self::Linear(c) => c.base.capacity,
            Self::NonLinear(c) => c.base.capacity,
            Self::Endurance(c) => c.capacity,
        }
    }

    pub fn speed_type(&self) -> ConfigType {
        match self {
            Self::Linear(c) => c.speed_type(),
            Self::NonLinear(c) => c.speed_type(),
            Self::Endurance(c) => c.speed_type(),
        }
    }

    pub fn range_type(&self) -> ConfigType {
        match self {
            Self::Linear(c) => c.range_type(),
            Self::NonLinear(c) => c.range_type(),
            Self::Endurance(c) => c.range_type(),
        }
    }

    /// The variant-specific values, in solver wire order.
    pub fn model_values(&self) -> Vec<f64> {
        match self {
            Self::Linear(c) => vec![
                c.base.takeoff_speed,
                c.base.cruise_speed,
                c.base.landing_speed,
                c.base.altitude,
                c.base.battery,
                c.beta,
                c.gamma,
            ],
            Self::NonLinear(c) => vec![
                c.base.takeoff_speed,
                c.base.cruise_speed,
                c.base.landing_speed,
                c.base.altitude,
                c.base.battery,
                c.coefficients.k1,
                c.coefficients.k2,
                c.coefficients.c1,
                c.coefficients.c2,
                c.coefficients.c4,
                c.coefficients.c5,
            ],
            Self::Endurance(c) => vec![c.fixed_time, c.fixed_distance, c.drone_speed],
        }
    }

    /// Inverse of [`DroneConfig::model_values`].
    pub fn from_values(
        class_name: &str,
        capacity: f64,
        speed_type: ConfigType,
        range_type: ConfigType,
        values: &[f64],
    ) -> Result<Self, Error> {
        let expected = match class_name {
            "DroneLinearConfig" => 7,
            "DroneNonlinearConfig" => 11,
            "DroneEnduranceConfig" => 3,
            _ => return Err(Error::format(format!("Unknown drone config class {class_name:?}"))),
        };
        if values.len() != expected {
            return Err(Error::format(format!(
                "{class_name} expects {expected} values, found {}",
                values.len()
            )));
        }

        let base = || VariableSpeedJSON {
            capacity,
            speed_type,
            range_type,
            takeoff_speed: values[0],
            cruise_speed: values[1],
            landing_speed: values[2],
            altitude: values[3],
            battery: values[4],
        };

        Ok(match class_name {
            "DroneLinearConfig" => Self::Linear(DroneLinearConfig {
                base: base(),
                beta: values[5],
                gamma: values[6],
            }),
            "DroneNonlinearConfig" => Self::NonLinear(DroneNonlinearConfig {
                base: base(),
                coefficients: NonlinearCoefficients {
                    k1: values[5],
                    k2: values[6],
                    c1: values[7],
                    c2: values[8],
                    c4: values[9],
                    c5: values[10],
                },
            }),
            _ => Self::Endurance(DroneEnduranceConfig {
                capacity,
                speed_type,
                range_type,
                fixed_time: values[0],
                fixed_distance: values[1],
                drone_speed: values[2],
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _dataset(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    const LINEAR: &str = r#"{
        "1": {
            "takeoffSpeed [m/s]": 7.8, "cruiseSpeed [m/s]": 15.6, "landingSpeed [m/s]": 3.9,
            "cruiseAlt [m]": 50, "capacity [kg]": 1.5, "batteryPower [Joule]": 270000,
            "speed_type": "low", "range": "low", "beta(w/kg)": 210.8, "gamma(w)": 181.2
        },
        "2": {
            "takeoffSpeed [m/s]": 15.6, "cruiseSpeed [m/s]": 31.3, "landingSpeed [m/s]": 7.8,
            "cruiseAlt [m]": 50, "capacity [kg]": 1.5, "batteryPower [Joule]": 500000,
            "speed_type": "high", "range": "high", "beta(w/kg)": 210.8, "gamma(w)": 181.2
        }
    }"#;

    const NONLINEAR: &str = r#"{
        "k1": 0.8554, "k2 (sqrt(kg/m)": 0.3051, "c1 (sqrt(m/kg)": 2.8037, "c2 (sqrt(m/kg)": 0.3177,
        "c4 (kg/m)": 0.0296, "c5 (Ns/m)": 0.0279, "note": "shared coefficients",
        "1": {
            "takeoffSpeed [m/s]": 7.8, "cruiseSpeed [m/s]": 15.6, "landingSpeed [m/s]": 3.9,
            "cruiseAlt [m]": 50, "capacity [kg]": 1.5, "batteryPower [Joule]": 270000,
            "speed_type": "low", "range_type": "high"
        }
    }"#;

    const ENDURANCE: &str = r#"[
        {
            "speed_type": "low", "range": "low", "capacity [kg]": 2.27,
            "FixedTime (s)": 700, "FixedDistance (m)": 1000000000, "Drone_speed (m/s)": 24.5872
        }
    ]"#;

    #[test]
    fn can_load_truck_record() {
        let dir = tempfile::tempdir().unwrap();
        _dataset(
            dir.path(),
            TRUCK_DATASET,
            r#"{"V_max (m/s)": 15.557, "M_t (kg)": 1500, "T (hour)": {"7-8": 0.7, "8-9": 0.4, "10-11": 0.6}}"#,
        );

        let truck = TruckConfig::load(dir.path()).unwrap();
        assert_eq!(truck.maximum_velocity, 15.557);
        assert_eq!(truck.capacity, 1500.0);
        assert_eq!(truck.coefficients, vec![0.7, 0.4, 0.6]);
    }

    #[test]
    fn can_keep_coefficients_in_document_order() {
        let dir = tempfile::tempdir().unwrap();
        _dataset(
            dir.path(),
            TRUCK_DATASET,
            r#"{"V_max (m/s)": 15.0, "M_t (kg)": 1500, "T (hour)": {"0-1": 1, "1-2": 2, "2-3": 3, "10-11": 11, "11-12": 12}}"#,
        );

        let truck = TruckConfig::load(dir.path()).unwrap();
        assert_eq!(truck.coefficients, vec![1.0, 2.0, 3.0, 11.0, 12.0]);
    }

    #[test]
    fn can_select_first_match_in_document_order() {
        let dir = tempfile::tempdir().unwrap();
        _dataset(
            dir.path(),
            DRONE_ENDURANCE_DATASET,
            r#"{
                "b": {"speed_type": "low", "range": "low", "capacity [kg]": 2.0,
                      "FixedTime (s)": 100, "FixedDistance (m)": 1000, "Drone_speed (m/s)": 10},
                "a": {"speed_type": "low", "range": "low", "capacity [kg]": 3.0,
                      "FixedTime (s)": 200, "FixedDistance (m)": 2000, "Drone_speed (m/s)": 20}
            }"#,
        );

        let drone = DroneConfig::load(dir.path(), EnergyModel::Endurance, ConfigType::Low, ConfigType::Low).unwrap();
        assert_eq!(drone.capacity(), 2.0);
        assert_eq!(drone.model_values(), vec![100.0, 1000.0, 10.0]);
    }

    #[test]
    fn can_reject_truck_without_coefficients() {
        let dir = tempfile::tempdir().unwrap();
        _dataset(dir.path(), TRUCK_DATASET, r#"{"V_max (m/s)": 15.0, "M_t (kg)": 1500, "T (hour)": []}"#);
        assert!(matches!(TruckConfig::load(dir.path()), Err(Error::Configuration(_))));
    }

    #[test]
    fn can_select_linear_config() {
        let dir = tempfile::tempdir().unwrap();
        _dataset(dir.path(), DRONE_LINEAR_DATASET, LINEAR);

        let drone = DroneConfig::load(dir.path(), EnergyModel::Linear, ConfigType::High, ConfigType::High).unwrap();
        assert_eq!(drone.class_name(), "DroneLinearConfig");
        assert_eq!(drone.speed_type(), ConfigType::High);
        assert_eq!(drone.model_values(), vec![15.6, 31.3, 7.8, 50.0, 500000.0, 210.8, 181.2]);

        assert!(matches!(
            DroneConfig::load(dir.path(), EnergyModel::Linear, ConfigType::Low, ConfigType::High),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn can_skip_non_records_in_nonlinear_dataset() {
        let dir = tempfile::tempdir().unwrap();
        _dataset(dir.path(), DRONE_NONLINEAR_DATASET, NONLINEAR);

        let configs = DroneNonlinearConfig::import_data(&dir.path().join(DRONE_NONLINEAR_DATASET)).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].1.coefficients.k2, 0.3051);
        assert_eq!(configs[0].1.base.range_type, ConfigType::High);
    }

    #[test]
    fn can_read_nested_nonlinear_records() {
        let dir = tempfile::tempdir().unwrap();
        _dataset(
            dir.path(),
            DRONE_NONLINEAR_DATASET,
            r#"{
                "k1": 0.8554, "k2 (sqrt(kg/m))": 0.3051, "c1 (sqrt(m/kg))": 2.8037, "c2 (sqrt(m/kg))": 0.3177,
                "c4 (kg/m)": 0.0296, "c5 (Ns/m)": 0.0279,
                "config": [{
                    "takeoffSpeed [m/s]": 7.8, "cruiseSpeed [m/s]": 15.6, "landingSpeed [m/s]": 3.9,
                    "cruiseAlt [m]": 50, "capacity [kg]": 1.5, "batteryPower [Joule]": 270000,
                    "speed_type": "high", "range_type": "low"
                }]
            }"#,
        );

        let drone =
            DroneConfig::load(dir.path(), EnergyModel::NonLinear, ConfigType::High, ConfigType::Low).unwrap();
        assert_eq!(drone.energy_model(), EnergyModel::NonLinear);
        assert_eq!(drone.model_values().len(), 11);
    }

    #[test]
    fn can_reject_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        _dataset(dir.path(), DRONE_LINEAR_DATASET, &LINEAR.replace("\"gamma(w)\": 181.2", "\"delta\": 1"));
        assert!(matches!(
            DroneConfig::load(dir.path(), EnergyModel::Linear, ConfigType::Low, ConfigType::Low),
            Err(Error::Configuration(_))
        ));

        _dataset(dir.path(), DRONE_NONLINEAR_DATASET, &NONLINEAR.replace("\"k1\": 0.8554,", ""));
        assert!(matches!(
            DroneNonlinearConfig::import_data(&dir.path().join(DRONE_NONLINEAR_DATASET)),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn can_load_endurance_config() {
        let dir = tempfile::tempdir().unwrap();
        _dataset(dir.path(), DRONE_ENDURANCE_DATASET, ENDURANCE);

        let drone = DroneConfig::load(dir.path(), EnergyModel::Endurance, ConfigType::Low, ConfigType::Low).unwrap();
        assert_eq!(drone.capacity(), 2.27);
        assert_eq!(drone.model_values(), vec![700.0, 1e9, 24.5872]);
        assert_eq!(drone.class_name(), "DroneEnduranceConfig");
    }

    #[test]
    fn can_rebuild_from_values() {
        let dir = tempfile::tempdir().unwrap();
        _dataset(dir.path(), DRONE_LINEAR_DATASET, LINEAR);
        let drone = DroneConfig::load(dir.path(), EnergyModel::Linear, ConfigType::Low, ConfigType::Low).unwrap();

        let rebuilt = DroneConfig::from_values(
            drone.class_name(),
            drone.capacity(),
            drone.speed_type(),
            drone.range_type(),
            &drone.model_values(),
        )
        .unwrap();
        assert_eq!(rebuilt, drone);

        assert!(matches!(
            DroneConfig::from_values("DroneLinearConfig", 1.0, ConfigType::Low, ConfigType::Low, &[1.0]),
            Err(Error::Format(_))
        ));
    }
}
