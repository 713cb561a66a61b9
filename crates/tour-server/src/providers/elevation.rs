//! Elevation lookup: Open-Meteo client and a caching wrapper.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tour_core::LatLng;

use super::{ElevationError, ElevationProvider};
use crate::cache::ElevationCache;

/// HTTP client for the Open-Meteo elevation API (or a compatible DEM server).
#[derive(Debug, Clone)]
pub struct OpenMeteoElevation {
    client: Client,
    base_url: String,
    timeout: Duration,
    max_points_per_request: usize,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoElevationResponse {
    elevation: Option<Vec<Option<f64>>>,
}

impl OpenMeteoElevation {
    pub fn new(base_url: impl Into<String>, timeout: Duration, max_points_per_request: usize) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            timeout,
            max_points_per_request: max_points_per_request.max(1),
        }
    }

    async fn fetch_chunk(&self, points: &[LatLng]) -> Result<Vec<Option<f64>>, ElevationError> {
        let latitudes: Vec<f64> = points.iter().map(|p| p.lat).collect();
        let longitudes: Vec<f64> = points.iter().map(|p| p.lon).collect();
        let url = build_provider_url(
            &self.base_url,
            &join_params(&latitudes),
            &join_params(&longitudes),
        );

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(ElevationError::Transport(format!(
                "elevation provider HTTP {}",
                response.status()
            )));
        }

        let payload: OpenMeteoElevationResponse = response
            .json()
            .await
            .map_err(|err| ElevationError::InvalidResponse(err.to_string()))?;
        let chunk = payload
            .elevation
            .ok_or_else(|| ElevationError::InvalidResponse("missing elevation".to_string()))?;

        if chunk.len() != points.len() {
            return Err(ElevationError::InvalidResponse(
                "unexpected sample count".to_string(),
            ));
        }

        Ok(chunk
            .into_iter()
            .map(|value| value.filter(|v| v.is_finite()))
            .collect())
    }
}

impl ElevationProvider for OpenMeteoElevation {
    /// Chunks that fail are reported as missing samples; only a failure of
    /// every chunk is an error.
    async fn elevations(&self, points: &[LatLng]) -> Result<Vec<Option<f64>>, ElevationError> {
        let mut elevations = Vec::with_capacity(points.len());
        let mut last_error = None;
        let mut any_ok = false;

        for chunk in points.chunks(self.max_points_per_request) {
            match self.fetch_chunk(chunk).await {
                Ok(values) => {
                    any_ok = true;
                    elevations.extend(values);
                }
                Err(err) => {
                    tracing::warn!("Elevation chunk of {} points failed: {}", chunk.len(), err);
                    elevations.extend(std::iter::repeat(None).take(chunk.len()));
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) if !any_ok => Err(err),
            _ => Ok(elevations),
        }
    }
}

/// Serves repeated lookups from an [`ElevationCache`] and forwards only the
/// misses to the wrapped provider.
#[derive(Debug, Clone)]
pub struct CachedElevation<P> {
    inner: P,
    cache: Arc<ElevationCache>,
}

impl<P: ElevationProvider> CachedElevation<P> {
    pub fn new(inner: P, cache: Arc<ElevationCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &ElevationCache {
        &self.cache
    }
}

impl<P: ElevationProvider> ElevationProvider for CachedElevation<P> {
    async fn elevations(&self, points: &[LatLng]) -> Result<Vec<Option<f64>>, ElevationError> {
        let mut results: Vec<Option<f64>> = points.iter().map(|p| self.cache.get(*p)).collect();
        let missing: Vec<usize> = results
            .iter()
            .enumerate()
            .filter_map(|(idx, value)| value.is_none().then_some(idx))
            .collect();

        if missing.is_empty() {
            tracing::debug!("Elevation cache hit for all {} samples", points.len());
            return Ok(results);
        }

        let query: Vec<LatLng> = missing.iter().map(|&idx| points[idx]).collect();
        let fetched = self.inner.elevations(&query).await?;
        for (&idx, value) in missing.iter().zip(fetched) {
            if let Some(elevation) = value {
                self.cache.insert(points[idx], elevation);
            }
            results[idx] = value;
        }
        self.cache.prune();

        Ok(results)
    }
}

fn map_transport_error(err: reqwest::Error) -> ElevationError {
    if err.is_timeout() {
        ElevationError::Timeout
    } else {
        ElevationError::Transport(err.to_string())
    }
}

fn join_params(values: &[f64]) -> String {
    let mut buf = String::new();
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            buf.push(',');
        }
        buf.push_str(&format!("{:.6}", value));
    }
    buf
}

fn build_provider_url(base: &str, latitudes: &str, longitudes: &str) -> String {
    let separator = if base.contains('?') { "&" } else { "?" };
    format!(
        "{}{}latitude={}&longitude={}",
        base, separator, latitudes, longitudes
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn provider_url_appends_query() {
        assert_eq!(
            build_provider_url("https://dem.local/v1/elevation", "45.000000", "9.000000"),
            "https://dem.local/v1/elevation?latitude=45.000000&longitude=9.000000"
        );
        assert_eq!(
            build_provider_url("https://dem.local/lookup?key=abc", "1", "2"),
            "https://dem.local/lookup?key=abc&latitude=1&longitude=2"
        );
    }

    #[test]
    fn null_elevations_deserialize_as_missing() {
        let payload: OpenMeteoElevationResponse =
            serde_json::from_str(r#"{"elevation":[812.0,null,790.5]}"#).unwrap();
        assert_eq!(
            payload.elevation,
            Some(vec![Some(812.0), None, Some(790.5)])
        );
    }

    #[derive(Default)]
    struct CountingProvider {
        queried: Mutex<Vec<usize>>,
    }

    impl ElevationProvider for CountingProvider {
        async fn elevations(&self, points: &[LatLng]) -> Result<Vec<Option<f64>>, ElevationError> {
            self.queried.lock().unwrap().push(points.len());
            Ok(points.iter().map(|p| Some(p.lat * 10.0)).collect())
        }
    }

    #[tokio::test]
    async fn cached_provider_only_queries_misses() {
        let cache = Arc::new(ElevationCache::new(Duration::from_secs(60), 100));
        let provider = CachedElevation::new(CountingProvider::default(), cache);

        let first = vec![LatLng::new(45.0, 9.0), LatLng::new(45.1, 9.0)];
        provider.elevations(&first).await.unwrap();

        let second = vec![
            LatLng::new(45.0, 9.0),
            LatLng::new(45.2, 9.0),
            LatLng::new(45.1, 9.0),
        ];
        let values = provider.elevations(&second).await.unwrap();
        assert_eq!(values.len(), 3);
        assert!((values[1].unwrap() - 452.0).abs() < 1e-9);
        assert_eq!(*provider.inner.queried.lock().unwrap(), vec![2, 1]);
        assert_eq!(provider.cache().len(), 3);
    }
}
