//! Netease Cloud Music playlist charts
//!
//! `GET {endpoint}?id={playlist_id}` answers `{code, result: {tracks: [...]}}`
//! with the whole chart in one response.

use async_trait::async_trait;
use serde_json::Value;

use super::{ChartSource, PageFetch};
use crate::domain::constants::netease::SUCCESS_CODE;
use crate::domain::{Category, SourceKind};
use crate::infrastructure::{FetchError, HttpClient};

pub struct NeteaseSource {
    client: HttpClient,
    endpoint: String,
}

impl NeteaseSource {
    pub fn new(client: HttpClient, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Pulls `result.tracks` out of a playlist response.
    ///
    /// A success code without a track list is an empty chart.
    pub fn extract_tracks(body: Value) -> Result<Vec<Value>, FetchError> {
        let Value::Object(mut body) = body else {
            return Err(FetchError::UnexpectedShape(
                "playlist response is not an object".to_string(),
            ));
        };

        let code = body.get("code").and_then(Value::as_i64);
        if code != Some(SUCCESS_CODE) {
            return Err(FetchError::ApiCode {
                code: code.unwrap_or(-1),
            });
        }

        match body
            .get_mut("result")
            .and_then(|result| result.get_mut("tracks"))
            .map(Value::take)
        {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(tracks)) => Ok(tracks),
            Some(_) => Err(FetchError::UnexpectedShape(
                "result.tracks is not an array".to_string(),
            )),
        }
    }
}

#[async_trait]
impl ChartSource for NeteaseSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Netease
    }

    fn page_size(&self) -> Option<usize> {
        None
    }

    async fn fetch_page(&self, category: &Category, _offset: usize) -> PageFetch {
        let result = self
            .client
            .get_json(&self.endpoint, &[("id", category.id.as_str())], SourceKind::Netease)
            .await
            .and_then(Self::extract_tracks);
        PageFetch::from_result(result, category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tracks_are_extracted_in_order() {
        let body = json!({
            "code": 200,
            "result": {"name": "热歌榜", "tracks": [{"id": 1}, {"id": 2}, {"id": 3}]}
        });
        let tracks = NeteaseSource::extract_tracks(body).unwrap();
        let ids: Vec<_> = tracks.iter().map(|t| t["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn non_success_code_is_an_api_error() {
        let result = NeteaseSource::extract_tracks(json!({"code": 404, "msg": "not found"}));
        assert!(matches!(result, Err(FetchError::ApiCode { code: 404 })));

        let result = NeteaseSource::extract_tracks(json!({"result": {"tracks": []}}));
        assert!(matches!(result, Err(FetchError::ApiCode { code: -1 })));
    }

    #[test]
    fn missing_track_list_is_an_empty_chart() {
        assert!(NeteaseSource::extract_tracks(json!({"code": 200})).unwrap().is_empty());
        assert!(NeteaseSource::extract_tracks(json!({"code": 200, "result": {}}))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn malformed_payloads_are_shape_errors() {
        assert!(matches!(
            NeteaseSource::extract_tracks(json!([1, 2])),
            Err(FetchError::UnexpectedShape(_))
        ));
        assert!(matches!(
            NeteaseSource::extract_tracks(json!({"code": 200, "result": {"tracks": "x"}})),
            Err(FetchError::UnexpectedShape(_))
        ));
    }
}
