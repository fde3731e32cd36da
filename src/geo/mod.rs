use crate::models::order::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Great-circle distance between two coordinates, used for the displayed
/// partner-to-destination ETA.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

#[cfg(test)]
mod tests {
    use super::haversine_km;
    use crate::models::order::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 18.5204,
            lng: 73.8567,
        };
        assert!(haversine_km(p, p) < 1e-9);
    }

    #[test]
    fn across_pune_is_a_few_km() {
        let depot = GeoPoint {
            lat: 18.5204,
            lng: 73.8567,
        };
        let doorstep = GeoPoint {
            lat: 18.5074,
            lng: 73.8077,
        };
        let distance = haversine_km(depot, doorstep);
        assert!(distance > 4.0 && distance < 7.0);
    }
}
