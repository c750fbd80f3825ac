use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use url::Url;

use crate::schema::Values;
use crate::submission::{Attribution, ClientInfo, Submission, SubmissionId};

pub const UTM_PARAMS: [&str; 6] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "utm_id",
];

/// Where the visitor was when they submitted. Supplied by the caller; nothing here is
/// fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationContext {
    /// Tracking parameters keyed by their query name (`utm_source`, ...).
    pub params: BTreeMap<String, String>,
    pub referrer: Option<String>,
    pub landing_page: Option<String>,
    pub client: ClientInfo,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl NavigationContext {
    /// Builds a context from the page URL, picking up its `utm_*` query parameters.
    pub fn from_landing_page(landing_page: Option<&str>, referrer: Option<&str>) -> Self {
        let mut ctx = NavigationContext {
            referrer: non_empty(referrer),
            landing_page: non_empty(landing_page),
            ..Default::default()
        };
        if let Some(page) = ctx.landing_page.clone() {
            match Url::parse(&page) {
                Ok(url) => {
                    for (k, v) in url.query_pairs() {
                        if UTM_PARAMS.contains(&k.as_ref()) {
                            ctx.set_param(&k, &v);
                        }
                    }
                }
                Err(e) => log::debug!("Landing page '{}' is not an absolute URL: {}", page, e),
            }
        }
        ctx
    }

    /// Sets a tracking parameter; blank values are ignored and explicit values win.
    pub fn set_param(&mut self, key: &str, value: &str) {
        if let Some(v) = non_empty(Some(value)) {
            self.params.insert(key.to_string(), v);
        }
    }

    pub fn with_client(mut self, client: ClientInfo) -> Self {
        self.client = client;
        self
    }

    pub fn attribution(&self) -> Attribution {
        let get = |key: &str| self.params.get(key).cloned();
        Attribution {
            utm_source: get("utm_source"),
            utm_medium: get("utm_medium"),
            utm_campaign: get("utm_campaign"),
            utm_term: get("utm_term"),
            utm_content: get("utm_content"),
            utm_id: get("utm_id"),
            referrer: self.referrer.clone(),
            landing_page: self.landing_page.clone(),
        }
    }
}

/// Assembles the submission record from validated values. Pure apart from the clock.
pub fn normalize(form_id: &str, values: Values, navigation: &NavigationContext) -> Submission {
    normalize_at(form_id, values, navigation, Utc::now())
}

pub fn normalize_at(
    form_id: &str,
    values: Values,
    navigation: &NavigationContext,
    created_at: DateTime<Utc>,
) -> Submission {
    Submission {
        id: SubmissionId::new(),
        form_id: form_id.to_string(),
        values,
        attribution: navigation.attribution(),
        client: navigation.client.clone(),
        created_at,
    }
}
