use rand::Rng;
use crate::models::status::Telemetry;

pub trait TelemetrySource: Send + Sync {
    fn sample(&self) -> Telemetry;
}

/// Readings drawn uniformly around a healthy cruising vehicle.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedTelemetry;

impl TelemetrySource for SimulatedTelemetry {
    fn sample(&self) -> Telemetry {
        let mut rng = rand::thread_rng();
        Telemetry {
            engine_rpm: 1500.0 + rng.gen_range(0.0..500.0),
            coolant_temp_c: 90.0 + rng.gen_range(0.0..5.0),
            battery_voltage_v: 13.8 + rng.gen_range(0.0..0.4),
            brake_temp_c: 150.0 + rng.gen_range(0.0..50.0),
            vehicle_speed_kph: 60.0 + rng.gen_range(0.0..20.0),
            short_term_fuel_trim_percent: rng.gen_range(-2.0..2.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_stay_in_range() {
        let source = SimulatedTelemetry;
        for _ in 0..200 {
            let t = source.sample();
            assert!((1500.0..=2000.0).contains(&t.engine_rpm));
            assert!((90.0..=95.0).contains(&t.coolant_temp_c));
            assert!((13.8..=14.21).contains(&t.battery_voltage_v));
            assert!((150.0..=200.0).contains(&t.brake_temp_c));
            assert!((60.0..=80.0).contains(&t.vehicle_speed_kph));
            assert!((-2.0..=2.0).contains(&t.short_term_fuel_trim_percent));
        }
    }
}
