//! URL construction for every remote call.

use atlas_core::ProbeId;
use atlas_core::config::ApiConfig;
use chrono::NaiveDate;

use crate::measurements::MeasurementId;

/// Base URLs and measurement infixes, resolved once from `[api]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    api_base: String,
    trends_base: String,
    default_use_es: bool,
    es_infix: String,
    legacy_infix: String,
}

impl Endpoints {
    pub fn new(api: &ApiConfig) -> Self {
        Self {
            api_base: base_url(&api.server),
            trends_base: base_url(&api.trends_server),
            default_use_es: api.use_es,
            es_infix: api.es_infix.clone(),
            legacy_infix: api.legacy_infix.clone(),
        }
    }

    /// Endpoints for a single server with default infixes.
    pub fn for_server(server: &str) -> Self {
        let api = ApiConfig {
            server: server.to_string(),
            trends_server: server.to_string(),
            ..ApiConfig::default()
        };
        Self::new(&api)
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// `/api/v2/measurements{infix}[/groups]`. `use_es` falls back to the
    /// configured default.
    pub fn measurements(&self, use_es: Option<bool>, groups: bool) -> String {
        let infix = if use_es.unwrap_or(self.default_use_es) {
            &self.es_infix
        } else {
            &self.legacy_infix
        };
        let groups = if groups { "/groups" } else { "" };
        format!("{}/api/v2/measurements{infix}{groups}", self.api_base)
    }

    pub fn measurement(&self, id: MeasurementId, use_es: Option<bool>) -> String {
        format!("{}/{id}", self.measurements(use_es, false))
    }

    pub fn measurement_fields(
        &self,
        id: MeasurementId,
        use_es: Option<bool>,
        fields: &[String],
    ) -> String {
        if fields.is_empty() {
            self.measurement(id, use_es)
        } else {
            format!("{}/?fields={}", self.measurement(id, use_es), fields.join(","))
        }
    }

    pub fn measurement_private(&self, id: MeasurementId) -> String {
        format!("{}/private", self.measurement(id, None))
    }

    pub fn measurement_group(&self, id: MeasurementId, use_es: Option<bool>) -> String {
        format!("{}/{id}", self.measurements(use_es, true))
    }

    /// Only the ES backend returns participant logs.
    pub fn participation_requests(&self, id: MeasurementId) -> String {
        format!(
            "{}?optional_fields=participation_requests,participant_logs&fields=participation_requests,participant_logs",
            self.measurement(id, Some(true))
        )
    }

    pub fn participating_probes(&self, id: MeasurementId, use_es: Option<bool>) -> String {
        format!("{}?fields=probes", self.measurement(id, use_es))
    }

    pub fn last_measurement_of_type(&self, kind: &str, use_es: Option<bool>) -> String {
        format!(
            "{}?type={kind}&sort=-id&fields=id&page_size=1",
            self.measurements(use_es, false)
        )
    }

    pub fn api_meta(&self) -> String {
        format!(
            "{}/docs/api/v2/reference/api-docs/api/v2/measurements",
            self.api_base
        )
    }

    pub fn probes(&self) -> String {
        format!("{}/api/v2/probes", self.api_base)
    }

    pub fn probe(&self, id: ProbeId) -> String {
        format!("{}/{id}", self.probes())
    }

    pub fn probe_registry(&self) -> String {
        format!("{}/all", self.probes())
    }

    /// Archive snapshot for one day, optionally restricted to `probe_ids`.
    pub fn probe_archive(&self, date: NaiveDate, probe_ids: Option<&[ProbeId]>) -> String {
        let mut url = format!("{}/archive/?date={}", self.probes(), date.format("%Y-%m-%d"));
        if let Some(ids) = probe_ids.filter(|ids| !ids.is_empty()) {
            let joined: Vec<String> = ids.iter().map(ToString::to_string).collect();
            url.push_str("&probe=");
            url.push_str(&joined.join(","));
        }
        url
    }

    pub fn trends_summary(&self, id: MeasurementId, probe: ProbeId) -> String {
        format!("{}/api/v1/trends/{id}/{probe}/summary", self.trends_base)
    }
}

/// `https://{server}` unless the server already names a scheme.
fn base_url(server: &str) -> String {
    let server = server.trim_end_matches('/');
    if server.contains("://") {
        server.to_string()
    } else {
        format!("https://{server}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Endpoints {
        let api = ApiConfig {
            server: "atlas.ripe.net".into(),
            trends_server: "trends.example.net".into(),
            es_infix: "/es".into(),
            legacy_infix: String::new(),
            ..ApiConfig::default()
        };
        Endpoints::new(&api)
    }

    #[test]
    fn measurement_urls() {
        let e = endpoints();
        assert_eq!(
            e.measurement(1001, None),
            "https://atlas.ripe.net/api/v2/measurements/1001"
        );
        assert_eq!(
            e.measurement(1001, Some(true)),
            "https://atlas.ripe.net/api/v2/measurements/es/1001"
        );
        assert_eq!(
            e.measurement_fields(1001, None, &["probes".into(), "status".into()]),
            "https://atlas.ripe.net/api/v2/measurements/1001/?fields=probes,status"
        );
        assert_eq!(
            e.measurement_group(7, None),
            "https://atlas.ripe.net/api/v2/measurements/groups/7"
        );
        assert_eq!(
            e.measurement_private(7),
            "https://atlas.ripe.net/api/v2/measurements/7/private"
        );
        assert_eq!(
            e.last_measurement_of_type("ping", None),
            "https://atlas.ripe.net/api/v2/measurements?type=ping&sort=-id&fields=id&page_size=1"
        );
    }

    #[test]
    fn participation_requests_always_use_es() {
        assert_eq!(
            endpoints().participation_requests(5),
            "https://atlas.ripe.net/api/v2/measurements/es/5?optional_fields=participation_requests,participant_logs&fields=participation_requests,participant_logs"
        );
    }

    #[test]
    fn configured_default_backend_applies() {
        let api = ApiConfig {
            use_es: true,
            es_infix: "/es".into(),
            ..ApiConfig::default()
        };
        let e = Endpoints::new(&api);
        assert!(e.measurement(1, None).contains("/measurements/es/1"));
        assert!(e.measurement(1, Some(false)).ends_with("/measurements/1"));
    }

    #[test]
    fn archive_filter_is_joined_without_leading_comma() {
        let e = endpoints();
        let date = NaiveDate::from_ymd_opt(2016, 6, 1).unwrap();
        assert_eq!(
            e.probe_archive(date, Some(&[1, 2, 3])),
            "https://atlas.ripe.net/api/v2/probes/archive/?date=2016-06-01&probe=1,2,3"
        );
        assert_eq!(
            e.probe_archive(date, None),
            "https://atlas.ripe.net/api/v2/probes/archive/?date=2016-06-01"
        );
        assert_eq!(e.probe_archive(date, Some(&[])), e.probe_archive(date, None));
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let e = Endpoints::for_server("http://127.0.0.1:8080/");
        assert_eq!(e.probe_registry(), "http://127.0.0.1:8080/api/v2/probes/all");
        assert_eq!(
            e.trends_summary(1, 2),
            "http://127.0.0.1:8080/api/v1/trends/1/2/summary"
        );
        assert_eq!(endpoints().probe(42), "https://atlas.ripe.net/api/v2/probes/42");
    }
}
