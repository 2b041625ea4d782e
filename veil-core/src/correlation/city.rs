use crate::error::CorrelationError;
use crate::model::SpoofType;
use rand::Rng;

/// Coordinates are served with this many decimals.
pub const COORD_DECIMALS: i32 = 6;
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct City {
  pub key: &'static str,
  pub name: &'static str,
  pub country_iso: &'static str,
  pub lat_min: f64,
  pub lat_max: f64,
  pub lon_min: f64,
  pub lon_max: f64,
  pub timezone: &'static str,
  pub locale: &'static str,
}

macro_rules! city {
  ($key:expr, $name:expr, $iso:expr, ($lat0:expr, $lat1:expr), ($lon0:expr, $lon1:expr), $tz:expr, $locale:expr) => {
    City {
      key: $key,
      name: $name,
      country_iso: $iso,
      lat_min: $lat0,
      lat_max: $lat1,
      lon_min: $lon0,
      lon_max: $lon1,
      timezone: $tz,
      locale: $locale,
    }
  };
}

pub const CITIES: &[City] = &[
  city!("new-york", "New York", "US", (40.55, 40.90), (-74.05, -73.70), "America/New_York", "en_US"),
  city!("los-angeles", "Los Angeles", "US", (33.90, 34.20), (-118.50, -118.15), "America/Los_Angeles", "en_US"),
  city!("chicago", "Chicago", "US", (41.70, 42.00), (-87.85, -87.55), "America/Chicago", "en_US"),
  city!("houston", "Houston", "US", (29.60, 29.95), (-95.60, -95.20), "America/Chicago", "en_US"),
  city!("london", "London", "GB", (51.40, 51.60), (-0.25, 0.05), "Europe/London", "en_GB"),
  city!("manchester", "Manchester", "GB", (53.42, 53.53), (-2.30, -2.18), "Europe/London", "en_GB"),
  city!("birmingham", "Birmingham", "GB", (52.42, 52.53), (-1.95, -1.80), "Europe/London", "en_GB"),
  city!("berlin", "Berlin", "DE", (52.45, 52.57), (13.28, 13.50), "Europe/Berlin", "de_DE"),
  city!("munich", "Munich", "DE", (48.10, 48.18), (11.50, 11.65), "Europe/Berlin", "de_DE"),
  city!("hamburg", "Hamburg", "DE", (53.50, 53.62), (9.90, 10.10), "Europe/Berlin", "de_DE"),
  city!("paris", "Paris", "FR", (48.82, 48.90), (2.28, 2.41), "Europe/Paris", "fr_FR"),
  city!("lyon", "Lyon", "FR", (45.72, 45.79), (4.80, 4.90), "Europe/Paris", "fr_FR"),
  city!("marseille", "Marseille", "FR", (43.25, 43.33), (5.35, 5.45), "Europe/Paris", "fr_FR"),
  city!("mumbai", "Mumbai", "IN", (18.95, 19.20), (72.82, 72.98), "Asia/Kolkata", "en_IN"),
  city!("delhi", "Delhi", "IN", (28.55, 28.72), (77.10, 77.30), "Asia/Kolkata", "en_IN"),
  city!("bengaluru", "Bengaluru", "IN", (12.90, 13.05), (77.52, 77.68), "Asia/Kolkata", "en_IN"),
  city!("tokyo", "Tokyo", "JP", (35.62, 35.75), (139.65, 139.80), "Asia/Tokyo", "ja_JP"),
  city!("osaka", "Osaka", "JP", (34.63, 34.72), (135.45, 135.55), "Asia/Tokyo", "ja_JP"),
  city!("yokohama", "Yokohama", "JP", (35.42, 35.50), (139.58, 139.66), "Asia/Tokyo", "ja_JP"),
  city!("sao-paulo", "São Paulo", "BR", (-23.65, -23.48), (-46.75, -46.55), "America/Sao_Paulo", "pt_BR"),
  city!("rio-de-janeiro", "Rio de Janeiro", "BR", (-22.98, -22.87), (-43.30, -43.17), "America/Sao_Paulo", "pt_BR"),
  city!("toronto", "Toronto", "CA", (43.63, 43.75), (-79.50, -79.30), "America/Toronto", "en_CA"),
  city!("vancouver", "Vancouver", "CA", (49.22, 49.30), (-123.20, -123.05), "America/Vancouver", "en_CA"),
  city!("montreal", "Montreal", "CA", (45.47, 45.56), (-73.65, -73.52), "America/Toronto", "fr_CA"),
  city!("sydney", "Sydney", "AU", (-33.95, -33.82), (151.10, 151.25), "Australia/Sydney", "en_AU"),
  city!("melbourne", "Melbourne", "AU", (-37.85, -37.77), (144.90, 145.02), "Australia/Melbourne", "en_AU"),
  city!("brisbane", "Brisbane", "AU", (-27.52, -27.42), (152.98, 153.08), "Australia/Brisbane", "en_AU"),
  city!("madrid", "Madrid", "ES", (40.38, 40.46), (-3.75, -3.65), "Europe/Madrid", "es_ES"),
  city!("barcelona", "Barcelona", "ES", (41.36, 41.43), (2.12, 2.20), "Europe/Madrid", "es_ES"),
  city!("valencia", "Valencia", "ES", (39.44, 39.50), (-0.40, -0.34), "Europe/Madrid", "es_ES"),
  city!("rome", "Rome", "IT", (41.85, 41.95), (12.45, 12.55), "Europe/Rome", "it_IT"),
  city!("milan", "Milan", "IT", (45.43, 45.50), (9.15, 9.23), "Europe/Rome", "it_IT"),
  city!("naples", "Naples", "IT", (40.83, 40.87), (14.22, 14.30), "Europe/Rome", "it_IT"),
  city!("mexico-city", "Mexico City", "MX", (19.35, 19.48), (-99.20, -99.08), "America/Mexico_City", "es_MX"),
  city!("guadalajara", "Guadalajara", "MX", (20.63, 20.72), (-103.40, -103.30), "America/Mexico_City", "es_MX"),
  city!("monterrey", "Monterrey", "MX", (25.64, 25.72), (-100.36, -100.28), "America/Monterrey", "es_MX"),
  city!("seoul", "Seoul", "KR", (37.50, 37.60), (126.95, 127.08), "Asia/Seoul", "ko_KR"),
  city!("busan", "Busan", "KR", (35.10, 35.20), (129.02, 129.12), "Asia/Seoul", "ko_KR"),
  city!("amsterdam", "Amsterdam", "NL", (52.34, 52.40), (4.85, 4.95), "Europe/Amsterdam", "nl_NL"),
  city!("rotterdam", "Rotterdam", "NL", (51.90, 51.94), (4.44, 4.52), "Europe/Amsterdam", "nl_NL"),
  city!("utrecht", "Utrecht", "NL", (52.07, 52.11), (5.08, 5.14), "Europe/Amsterdam", "nl_NL"),
  city!("singapore-central", "Singapore Central", "SG", (1.27, 1.31), (103.82, 103.86), "Asia/Singapore", "en_SG"),
  city!("singapore-east", "Singapore East", "SG", (1.32, 1.37), (103.92, 103.96), "Asia/Singapore", "en_SG"),
  city!("stockholm", "Stockholm", "SE", (59.30, 59.36), (18.00, 18.12), "Europe/Stockholm", "sv_SE"),
  city!("gothenburg", "Gothenburg", "SE", (57.68, 57.73), (11.93, 12.02), "Europe/Stockholm", "sv_SE"),
  city!("malmo", "Malmö", "SE", (55.58, 55.62), (12.98, 13.04), "Europe/Stockholm", "sv_SE"),
];

impl City {
  pub fn contains(&self, lat: f64, lon: f64) -> bool {
    lat >= self.lat_min - EPSILON
      && lat <= self.lat_max + EPSILON
      && lon >= self.lon_min - EPSILON
      && lon <= self.lon_max + EPSILON
  }
}

pub fn city_by_key(key: &str) -> Option<&'static City> {
  CITIES.iter().find(|c| c.key == key)
}

pub fn cities_in(iso: &str) -> impl Iterator<Item = &'static City> + '_ {
  CITIES.iter().filter(move |c| c.country_iso.eq_ignore_ascii_case(iso))
}

/// First city whose box holds the point.
pub fn city_containing(lat: f64, lon: f64) -> Option<&'static City> {
  CITIES.iter().find(|c| c.contains(lat, lon))
}

fn round_coord(v: f64, min: f64, max: f64) -> f64 {
  let scale = 10f64.powi(COORD_DECIMALS);
  ((v * scale).round() / scale).clamp(min, max)
}

pub fn format_coord(v: f64) -> String {
  format!("{:.*}", COORD_DECIMALS as usize, v)
}

/// A point inside one city, with that city's timezone and locale.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationConfig {
  city: &'static City,
  latitude: f64,
  longitude: f64,
  timezone: String,
  locale: String,
}

impl LocationConfig {
  pub fn new(
    city: &'static City,
    latitude: f64,
    longitude: f64,
    timezone: impl Into<String>,
    locale: impl Into<String>,
  ) -> Result<Self, CorrelationError> {
    let timezone = timezone.into();
    let locale = locale.into();
    if !city.contains(latitude, longitude) {
      return Err(CorrelationError::OutsideCity {
        city: city.key.to_string(),
        lat: latitude,
        lon: longitude,
      });
    }
    if timezone != city.timezone {
      return Err(CorrelationError::Mismatch {
        field: "timezone",
        value: timezone,
        expected: city.timezone.to_string(),
      });
    }
    if locale != city.locale {
      return Err(CorrelationError::Mismatch {
        field: "locale",
        value: locale,
        expected: city.locale.to_string(),
      });
    }
    Ok(Self {
      city,
      latitude,
      longitude,
      timezone,
      locale,
    })
  }

  pub fn generate<R: Rng + ?Sized>(
    city: &'static City,
    rng: &mut R,
  ) -> Result<Self, CorrelationError> {
    let lat = round_coord(rng.gen_range(city.lat_min..=city.lat_max), city.lat_min, city.lat_max);
    let lon = round_coord(rng.gen_range(city.lon_min..=city.lon_max), city.lon_min, city.lon_max);
    Self::new(city, lat, lon, city.timezone, city.locale)
  }

  pub fn city(&self) -> &'static City {
    self.city
  }

  pub fn latitude(&self) -> f64 {
    self.latitude
  }

  pub fn longitude(&self) -> f64 {
    self.longitude
  }

  pub fn value(&self, ty: SpoofType) -> Option<String> {
    match ty {
      SpoofType::Latitude => Some(format_coord(self.latitude)),
      SpoofType::Longitude => Some(format_coord(self.longitude)),
      SpoofType::Timezone => Some(self.timezone.clone()),
      SpoofType::Locale => Some(self.locale.clone()),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::correlation::carrier::{carriers_in, COUNTRIES};
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use std::collections::HashSet;

  #[test]
  fn every_carrier_country_has_two_cities() {
    assert!(CITIES.len() >= 42);
    for c in COUNTRIES {
      assert!(cities_in(c.iso).count() >= 2, "{}", c.iso);
    }
    for city in CITIES {
      assert!(carriers_in(city.country_iso).count() >= 2, "{}", city.key);
      assert!(city.lat_min < city.lat_max && city.lon_min < city.lon_max, "{}", city.key);
    }
  }

  #[test]
  fn keys_are_unique_and_boxes_do_not_overlap() {
    let keys: HashSet<&str> = CITIES.iter().map(|c| c.key).collect();
    assert_eq!(keys.len(), CITIES.len());
    for city in CITIES {
      let lat = (city.lat_min + city.lat_max) / 2.0;
      let lon = (city.lon_min + city.lon_max) / 2.0;
      assert_eq!(city_containing(lat, lon).map(|c| c.key), Some(city.key));
    }
  }

  #[test]
  fn locale_and_timezone_never_cross_countries() {
    for a in CITIES {
      for b in CITIES {
        if a.country_iso != b.country_iso {
          assert_ne!(a.timezone, b.timezone, "{} {}", a.key, b.key);
          assert_ne!(a.locale, b.locale, "{} {}", a.key, b.key);
        }
      }
    }
  }

  #[test]
  fn generated_points_stay_inside_and_round_trip_as_text() {
    let mut rng = StdRng::seed_from_u64(21);
    for city in CITIES {
      for _ in 0..20 {
        let loc = LocationConfig::generate(city, &mut rng).unwrap();
        let lat: f64 = loc.value(SpoofType::Latitude).unwrap().parse().unwrap();
        let lon: f64 = loc.value(SpoofType::Longitude).unwrap().parse().unwrap();
        assert!(city.contains(lat, lon), "{} {lat} {lon}", city.key);
        assert_eq!(loc.value(SpoofType::Timezone).as_deref(), Some(city.timezone));
      }
    }
  }

  #[test]
  fn construction_rejects_contradictions() {
    let paris = city_by_key("paris").unwrap();
    assert!(matches!(
      LocationConfig::new(paris, 40.7, -74.0, paris.timezone, paris.locale),
      Err(CorrelationError::OutsideCity { .. })
    ));
    assert!(matches!(
      LocationConfig::new(paris, 48.85, 2.35, "Asia/Tokyo", paris.locale),
      Err(CorrelationError::Mismatch { field: "timezone", .. })
    ));
    assert!(matches!(
      LocationConfig::new(paris, 48.85, 2.35, paris.timezone, "en_US"),
      Err(CorrelationError::Mismatch { field: "locale", .. })
    ));
  }
}
