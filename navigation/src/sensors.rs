use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Body frame specific force (m/s^2), or None when no new sample is ready.
pub trait Accelerometer {
    fn read_accelerometer(&mut self) -> Option<Vector3<f64>>;
}

/// Body frame angular rate (rad/s).
pub trait Gyroscope {
    fn read_gyroscope(&mut self) -> Option<Vector3<f64>>;
}

/// Body frame magnetic field, in the same units as the configured reference.
pub trait Magnetometer {
    fn read_magnetometer(&mut self) -> Option<Vector3<f64>>;
}

/// Earth-fixed Cartesian position fix (m).
pub trait GnssReceiver {
    fn read_position_fix(&mut self) -> Option<Vector3<f64>>;
}

impl<T: Accelerometer + ?Sized> Accelerometer for &mut T {
    fn read_accelerometer(&mut self) -> Option<Vector3<f64>> {
        (**self).read_accelerometer()
    }
}

impl<T: Gyroscope + ?Sized> Gyroscope for &mut T {
    fn read_gyroscope(&mut self) -> Option<Vector3<f64>> {
        (**self).read_gyroscope()
    }
}

impl<T: Magnetometer + ?Sized> Magnetometer for &mut T {
    fn read_magnetometer(&mut self) -> Option<Vector3<f64>> {
        (**self).read_magnetometer()
    }
}

impl<T: GnssReceiver + ?Sized> GnssReceiver for &mut T {
    fn read_position_fix(&mut self) -> Option<Vector3<f64>> {
        (**self).read_position_fix()
    }
}

/// Sensor suite holding at most one pending reading per sensor.
/// A reading is handed out once and then cleared, like a driver's
/// data-ready flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LatchedSensors {
    pub accelerometer: Option<Vector3<f64>>,
    pub gyroscope: Option<Vector3<f64>>,
    pub magnetometer: Option<Vector3<f64>>,
    pub position_fix: Option<Vector3<f64>>,
}

impl LatchedSensors {
    pub fn latch_accelerometer(&mut self, reading: Vector3<f64>) {
        self.accelerometer = Some(reading);
    }

    pub fn latch_gyroscope(&mut self, reading: Vector3<f64>) {
        self.gyroscope = Some(reading);
    }

    pub fn latch_magnetometer(&mut self, reading: Vector3<f64>) {
        self.magnetometer = Some(reading);
    }

    pub fn latch_position_fix(&mut self, reading: Vector3<f64>) {
        self.position_fix = Some(reading);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl Accelerometer for LatchedSensors {
    fn read_accelerometer(&mut self) -> Option<Vector3<f64>> {
        self.accelerometer.take()
    }
}

impl Gyroscope for LatchedSensors {
    fn read_gyroscope(&mut self) -> Option<Vector3<f64>> {
        self.gyroscope.take()
    }
}

impl Magnetometer for LatchedSensors {
    fn read_magnetometer(&mut self) -> Option<Vector3<f64>> {
        self.magnetometer.take()
    }
}

impl GnssReceiver for LatchedSensors {
    fn read_position_fix(&mut self) -> Option<Vector3<f64>> {
        self.position_fix.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_twice<S: Magnetometer>(mut sensor: S) -> (Option<Vector3<f64>>, Option<Vector3<f64>>) {
        (sensor.read_magnetometer(), sensor.read_magnetometer())
    }

    #[test]
    fn test_latched_reading_is_consumed() {
        let mut sensors = LatchedSensors::default();
        sensors.latch_magnetometer(Vector3::new(2.0e-5, 0.0, 4.0e-5));

        // through the &mut impl, so the suite is still ours afterwards
        let (first, second) = read_twice(&mut sensors);
        assert_eq!(first, Some(Vector3::new(2.0e-5, 0.0, 4.0e-5)));
        assert_eq!(second, None);
        assert_eq!(sensors.magnetometer, None);
    }

    #[test]
    fn test_latched_sensors_are_independent() {
        let mut sensors = LatchedSensors::default();
        sensors.latch_gyroscope(Vector3::z());
        sensors.latch_position_fix(Vector3::x());

        assert_eq!(sensors.read_accelerometer(), None);
        assert_eq!(sensors.read_gyroscope(), Some(Vector3::z()));
        assert_eq!(sensors.position_fix, Some(Vector3::x()));

        sensors.clear();
        assert_eq!(sensors.read_position_fix(), None);
    }
}
