use std::io;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use unbillable_core::{forecast, RawQueryInput};
use unbillable_storage::{PersistentMetricsStore, StorageBackend, StorageError};

use crate::config::ServerConfig;
use crate::http::{read_http_request, write_http_response, HttpRequest, HttpResponse};
use crate::protocol::RecordMetricRequest;

pub struct ForecastServer {
    store: Arc<Mutex<Box<dyn StorageBackend>>>,
    config: ServerConfig,
}

impl ForecastServer {
    pub fn open(config: ServerConfig) -> Result<Self, StorageError> {
        let store = PersistentMetricsStore::open(&config.db_path)?;
        info!(
            path = %config.db_path.display(),
            rows = store.len(),
            "metrics store ready"
        );
        Ok(Self::with_backend(Box::new(store), config))
    }

    pub fn with_backend(backend: Box<dyn StorageBackend>, config: ServerConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(backend)),
            config,
        }
    }

    pub fn serve_http(&self) -> io::Result<()> {
        let listener = TcpListener::bind(&self.config.http_addr)?;
        info!(addr = %listener.local_addr()?, "unbillabled http listening");
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(err) = self.handle_http_connection(stream) {
                        warn!(error = %err, "http request error");
                    }
                }
                Err(err) => {
                    warn!(error = %err, "http accept error");
                }
            }
        }
        Ok(())
    }

    fn handle_http_connection(&self, mut stream: TcpStream) -> io::Result<()> {
        let Some(req) = read_http_request(&stream, self.config.max_body_bytes)? else {
            return Ok(());
        };
        let method = req.method.clone();
        let path = req.path.clone();
        let response = self.dispatch_http_request(req);
        debug!(%method, %path, status = response.status, "handled request");
        write_http_response(&mut stream, &response)
    }

    pub fn dispatch_http_request(&self, req: HttpRequest) -> HttpResponse {
        if req.oversized {
            return error_response(413, "request body too large");
        }

        if req.method == "OPTIONS" {
            return HttpResponse::empty(204);
        }

        match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/health") => HttpResponse::json(200, json!({"status":"ok"})),
            ("POST", "/api/predict") => self.handle_predict(&req.body),
            ("POST", "/api/metrics") => self.handle_record_metric(&req.body),
            ("GET", "/api/metrics") => self.handle_list_metrics(&req),
            ("GET", "/api/metrics/stats") => HttpResponse::json(200, self.store.lock().stats()),
            (_, "/health" | "/api/predict" | "/api/metrics" | "/api/metrics/stats") => {
                error_response(405, "method not allowed")
            }
            _ => error_response(404, "not found"),
        }
    }

    fn handle_predict(&self, body: &[u8]) -> HttpResponse {
        let raw: RawQueryInput = match parse_body(body) {
            Ok(raw) => raw,
            Err(resp) => return resp,
        };
        let result = {
            let store = self.store.lock();
            forecast(&**store, &raw)
        };
        match result {
            Ok(forecast) => {
                info!(
                    predicted = forecast.predicted(),
                    driver = %forecast.driver(),
                    "forecast served"
                );
                match serde_json::to_value(&forecast) {
                    Ok(v) => HttpResponse::json(200, v),
                    Err(err) => error_response(500, &err.to_string()),
                }
            }
            Err(err) => error_response(400, &err.to_string()),
        }
    }

    fn handle_record_metric(&self, body: &[u8]) -> HttpResponse {
        let req: RecordMetricRequest = match parse_body(body) {
            Ok(req) => req,
            Err(resp) => return resp,
        };
        let new_record = match req.into_new_record() {
            Ok(r) => r,
            Err(msg) => return error_response(400, &msg),
        };
        let appended = self.store.lock().append(new_record);
        match appended {
            Ok(record) => {
                info!(id = %record.id, "metric recorded");
                HttpResponse::json(
                    201,
                    json!({"message": "Metric added successfully", "data": record}),
                )
            }
            Err(StorageError::InvalidInput(msg)) => error_response(400, &msg),
            Err(err) => {
                warn!(error = %err, "failed to persist metric");
                error_response(500, &err.to_string())
            }
        }
    }

    fn handle_list_metrics(&self, req: &HttpRequest) -> HttpResponse {
        let limit = req
            .query
            .get("limit")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(self.config.list_limit)
            .clamp(1, self.config.list_limit);
        let records = self.store.lock().list(limit);
        HttpResponse::json(200, json!({"count": records.len(), "records": records}))
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, HttpResponse> {
    if body.is_empty() {
        return Err(error_response(400, "request body is empty"));
    }
    serde_json::from_slice(body).map_err(|e| error_response(400, &format!("invalid json: {e}")))
}

fn error_response(status: u16, message: &str) -> HttpResponse {
    HttpResponse::json(status, json!({"error": message}))
}

#[cfg(test)]
mod tests {
    use unbillable_core::{HistoricalRecord, HistorySource};
    use unbillable_storage::{MetricRecord, NewMetricRecord};

    use super::*;

    #[derive(Default)]
    struct MemoryBackend {
        records: Vec<MetricRecord>,
    }

    impl HistorySource for MemoryBackend {
        fn in_headcount_range(&self, min: f64, max: f64) -> Vec<HistoricalRecord> {
            unbillable_storage::history_in_range(&self.records, min, max)
        }

        fn all_by_headcount(&self) -> Vec<HistoricalRecord> {
            let mut rows: Vec<_> = self.records.iter().map(|r| r.record.clone()).collect();
            unbillable_core::sort_by_headcount(&mut rows);
            rows
        }
    }

    impl StorageBackend for MemoryBackend {
        fn append(&mut self, n: NewMetricRecord) -> Result<MetricRecord, StorageError> {
            if n.headcount <= 0.0 {
                return Err(StorageError::InvalidInput("headcount must be positive".into()));
            }
            let record = MetricRecord {
                id: format!("metric-{}", self.records.len() + 1),
                record: HistoricalRecord {
                    headcount: n.headcount,
                    software_costs: n.software_costs,
                    rent: n.rent,
                    utilization_percentage: n.utilization_percentage,
                    actual_unbillable_expenditure: n.actual_unbillable_expenditure,
                    month_year: n.month_year,
                },
                recorded_at_ms: 0,
            };
            self.records.push(record.clone());
            Ok(record)
        }

        fn list(&self, limit: usize) -> Vec<MetricRecord> {
            self.records.iter().rev().take(limit).cloned().collect()
        }

        fn stats(&self) -> Value {
            json!({"count": self.records.len()})
        }
    }

    fn server() -> ForecastServer {
        let config = ServerConfig {
            list_limit: 3,
            ..ServerConfig::default()
        };
        ForecastServer::with_backend(Box::new(MemoryBackend::default()), config)
    }

    fn request(method: &str, path: &str, body: &str) -> HttpRequest {
        let (path, query) = crate::http::parse_path_query(path);
        HttpRequest {
            method: method.to_string(),
            path,
            query,
            body: body.as_bytes().to_vec(),
            oversized: false,
        }
    }

    fn body_json(resp: &HttpResponse) -> Value {
        serde_json::from_slice(&resp.body).expect("json body")
    }

    #[test]
    fn predict_with_empty_history_uses_heuristic() {
        let s = server();
        let resp = s.dispatch_http_request(request(
            "POST",
            "/api/predict",
            r#"{"headcount":"10","software_costs":"20000","rent":"30000","utilization":"80"}"#,
        ));
        assert_eq!(resp.status, 200);
        let body = body_json(&resp);
        assert_eq!(body["kind"], "heuristic");
        assert_eq!(
            body["main_driver"],
            "Heuristic Estimate (Insufficient Historical Data)"
        );
    }

    #[test]
    fn predict_rejects_non_numeric_input() {
        let s = server();
        let resp = s.dispatch_http_request(request(
            "POST",
            "/api/predict",
            r#"{"headcount":"ten","software_costs":1,"rent":1,"utilization":50}"#,
        ));
        assert_eq!(resp.status, 400);
        assert!(body_json(&resp)["error"]
            .as_str()
            .unwrap_or_default()
            .contains("headcount"));
    }

    #[test]
    fn zero_headcount_is_inactive() {
        let s = server();
        let resp = s.dispatch_http_request(request(
            "POST",
            "/api/predict",
            r#"{"headcount":0,"software_costs":5000,"rent":5000,"utilization":50}"#,
        ));
        assert_eq!(resp.status, 200);
        let body = body_json(&resp);
        assert_eq!(body["kind"], "inactive");
        assert_eq!(body["predicted_unbillable_expenditure"], 0.0);
    }

    #[test]
    fn record_then_list_respects_limit() {
        let s = server();
        for month in 1..=5 {
            let body = format!(
                r#"{{"headcount":10,"software_costs":1000,"rent":2000,"utilization":70,
                    "actual_unbillable_expenditure":50000,"month_year":"2024-0{month}"}}"#
            );
            let resp = s.dispatch_http_request(request("POST", "/api/metrics", &body));
            assert_eq!(resp.status, 201);
        }
        let listed = body_json(&s.dispatch_http_request(request("GET", "/api/metrics?limit=50", "")));
        assert_eq!(listed["count"], 3);
        assert_eq!(listed["records"][0]["id"], "metric-5");
    }

    #[test]
    fn invalid_metric_is_rejected() {
        let s = server();
        let resp = s.dispatch_http_request(request(
            "POST",
            "/api/metrics",
            r#"{"headcount":0,"software_costs":1,"rent":1,"utilization":1,
                "actual_unbillable_expenditure":1,"month_year":"2024-01"}"#,
        ));
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn routing_edges() {
        let s = server();
        assert_eq!(s.dispatch_http_request(request("GET", "/nope", "")).status, 404);
        assert_eq!(s.dispatch_http_request(request("GET", "/api/predict", "")).status, 405);
        assert_eq!(s.dispatch_http_request(request("OPTIONS", "/api/predict", "")).status, 204);
        assert_eq!(s.dispatch_http_request(request("POST", "/api/predict", "")).status, 400);

        let mut big = request("POST", "/api/predict", "");
        big.oversized = true;
        assert_eq!(s.dispatch_http_request(big).status, 413);
    }
}
