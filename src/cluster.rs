//! Greedy location clustering
//!
//! Files are visited once in discovery order and joined to the first cluster
//! whose running centroid is within the radius. This is not DBSCAN: the
//! result depends on input order and the centroid drifts as members are
//! added, but it is deterministic for a given tree.

use crate::media::{GpsCoord, MediaFile};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

static GPS_FOLDER: OnceLock<Regex> = OnceLock::new();

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates in meters
pub fn haversine_m(a: GpsCoord, b: GpsCoord) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Files sharing a location
#[derive(Debug, Clone, PartialEq)]
pub struct LocationCluster {
    /// Discovery indices of the members, in discovery order
    pub members: Vec<usize>,
    pub centroid: GpsCoord,
    lat_sum: f64,
    lon_sum: f64,
}

impl LocationCluster {
    fn seed(index: usize, at: GpsCoord) -> Self {
        Self {
            members: vec![index],
            centroid: at,
            lat_sum: at.latitude,
            lon_sum: at.longitude,
        }
    }

    fn add(&mut self, index: usize, at: GpsCoord) {
        self.members.push(index);
        self.lat_sum += at.latitude;
        self.lon_sum += at.longitude;
        let n = self.members.len() as f64;
        self.centroid = GpsCoord {
            latitude: self.lat_sum / n,
            longitude: self.lon_sum / n,
        };
    }

    /// Folder name like `48.8566N-2.3522E`
    pub fn folder_name(&self) -> String {
        gps_folder_name(self.centroid)
    }
}

pub fn gps_folder_name(at: GpsCoord) -> String {
    let ns = if at.latitude < 0.0 { 'S' } else { 'N' };
    let ew = if at.longitude < 0.0 { 'W' } else { 'E' };
    format!(
        "{:.4}{}-{:.4}{}",
        at.latitude.abs(),
        ns,
        at.longitude.abs(),
        ew
    )
}

/// Whether a folder name looks like one produced by [`gps_folder_name`]
pub fn is_gps_folder_name(name: &str) -> bool {
    GPS_FOLDER
        .get_or_init(|| Regex::new(r"^\d{1,2}\.\d+[NS]-\d{1,3}\.\d+[EW]$").unwrap())
        .is_match(name)
}

/// Clusters plus the files that had no GPS position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clustering {
    pub clusters: Vec<LocationCluster>,
    /// Discovery indices of files without GPS, in discovery order
    pub no_location: Vec<usize>,
}

impl Clustering {
    /// `NoLocation/` only exists next to at least one real cluster
    pub fn has_no_location_folder(&self) -> bool {
        !self.clusters.is_empty() && !self.no_location.is_empty()
    }
}

/// Partition files by location; `files` must be in discovery order
pub fn cluster_by_location(files: &[&MediaFile], radius_m: f64) -> Clustering {
    let mut clustering = Clustering::default();

    for file in files {
        let Some(at) = file.gps else {
            clustering.no_location.push(file.index);
            continue;
        };

        match clustering
            .clusters
            .iter_mut()
            .find(|c| haversine_m(c.centroid, at) <= radius_m)
        {
            Some(cluster) => cluster.add(file.index, at),
            None => clustering.clusters.push(LocationCluster::seed(file.index, at)),
        }
    }

    debug!(
        clusters = clustering.clusters.len(),
        without_gps = clustering.no_location.len(),
        radius_m,
        "Clustered files by location"
    );
    clustering
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaKind;
    use crate::media::{DateSource, ScannedFile};
    use chrono::NaiveDateTime;
    use std::path::PathBuf;

    fn file(index: usize, gps: Option<(f64, f64)>) -> MediaFile {
        let ts = NaiveDateTime::default();
        MediaFile::from_scanned(
            ScannedFile {
                path: PathBuf::from(format!("/d/{}.jpg", index)),
                kind: MediaKind::Photo,
                size: 1,
                index,
                modified: ts,
            },
            ts,
            DateSource::ExifPhoto,
            gps.and_then(|(lat, lon)| GpsCoord::new(lat, lon)),
        )
    }

    /// Point `meters` north of `origin`
    fn north_of(origin: (f64, f64), meters: f64) -> (f64, f64) {
        let dlat = (meters / EARTH_RADIUS_M).to_degrees();
        (origin.0 + dlat, origin.1)
    }

    #[test]
    fn test_haversine_known_distance() {
        let paris = GpsCoord::new(48.8566, 2.3522).unwrap();
        let london = GpsCoord::new(51.5074, -0.1278).unwrap();
        let d = haversine_m(paris, london);
        assert!((d - 343_500.0).abs() < 2_000.0, "got {}", d);
        assert_eq!(haversine_m(paris, paris), 0.0);
    }

    #[test]
    fn test_close_files_share_a_cluster() {
        let origin = (48.8566, 2.3522);
        let files = vec![file(0, Some(origin)), file(1, Some(north_of(origin, 100.0)))];
        let refs: Vec<_> = files.iter().collect();

        let clustering = cluster_by_location(&refs, 2000.0);
        assert_eq!(clustering.clusters.len(), 1);
        assert_eq!(clustering.clusters[0].members, vec![0, 1]);
        assert!(!clustering.has_no_location_folder());
    }

    #[test]
    fn test_distant_files_split() {
        let origin = (48.8566, 2.3522);
        let files = vec![file(0, Some(origin)), file(1, Some(north_of(origin, 5000.0)))];
        let refs: Vec<_> = files.iter().collect();

        let clustering = cluster_by_location(&refs, 2000.0);
        assert_eq!(clustering.clusters.len(), 2);
    }

    #[test]
    fn test_centroid_is_running_mean() {
        let origin = (10.0, 20.0);
        let files = vec![
            file(0, Some(origin)),
            file(1, Some(north_of(origin, 1500.0))),
            // Within radius of the drifted centroid (750 m north) but 2.6 km
            // from the seed
            file(2, Some(north_of(origin, 2600.0))),
        ];
        let refs: Vec<_> = files.iter().collect();

        let clustering = cluster_by_location(&refs, 2000.0);
        assert_eq!(clustering.clusters.len(), 1);
        let centroid = clustering.clusters[0].centroid;
        let expected = (origin.0 + north_of(origin, 1500.0).0 + north_of(origin, 2600.0).0) / 3.0;
        assert!((centroid.latitude - expected).abs() < 1e-12);
    }

    #[test]
    fn test_no_location_only_next_to_real_clusters() {
        let files = vec![file(0, None), file(1, None)];
        let refs: Vec<_> = files.iter().collect();
        let clustering = cluster_by_location(&refs, 2000.0);
        assert!(clustering.clusters.is_empty());
        assert!(!clustering.has_no_location_folder());

        let files = vec![file(0, None), file(1, Some((1.0, 1.0)))];
        let refs: Vec<_> = files.iter().collect();
        let clustering = cluster_by_location(&refs, 2000.0);
        assert!(clustering.has_no_location_folder());
        assert_eq!(clustering.no_location, vec![0]);
    }

    #[test]
    fn test_folder_name_hemispheres() {
        assert_eq!(
            gps_folder_name(GpsCoord::new(48.85661, 2.35222).unwrap()),
            "48.8566N-2.3522E"
        );
        assert_eq!(
            gps_folder_name(GpsCoord::new(-33.8688, -70.5).unwrap()),
            "33.8688S-70.5000W"
        );
        assert!(is_gps_folder_name("48.8566N-2.3522E"));
        assert!(is_gps_folder_name("33.8688S-170.5000W"));
        assert!(!is_gps_folder_name("NoLocation"));
        assert!(!is_gps_folder_name("2024 - 0101 - 1200"));
    }
}
