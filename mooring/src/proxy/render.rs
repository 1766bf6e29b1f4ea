//! Dynamic configuration document for the proxy's file provider

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::proxy::ProxyRoute;
use crate::proxy::labels::host_rule;
use crate::utils::slugify;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicConfig {
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub routers: BTreeMap<String, Router>,
    pub services: BTreeMap<String, Service>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub middlewares: BTreeMap<String, Middleware>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    pub rule: String,
    pub service: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub middlewares: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<RouterTls>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterTls {
    #[serde(
        rename = "certResolver",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cert_resolver: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "loadBalancer")]
    pub load_balancer: LoadBalancer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub servers: Vec<Server>,
    #[serde(
        rename = "healthCheck",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub health_check: Option<HealthCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub path: String,
    pub interval: String,
    pub timeout: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retries: u32,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Middleware {
    #[serde(rename = "stripPrefix")]
    pub strip_prefix: StripPrefix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripPrefix {
    pub prefixes: Vec<String>,
}

/// Key shared by a route's router and service
pub fn route_key(route: &ProxyRoute) -> String {
    let base = slugify(&route.service_name);
    if base.is_empty() {
        route.id.clone()
    } else {
        format!("{}-{}", base, route.id)
    }
}

/// Matcher for a route: its hosts, ANDed with the path prefix when set.
pub fn route_rule(route: &ProxyRoute) -> String {
    let hosts = host_rule(&route.hostnames);
    match route.path_prefix.as_deref().filter(|p| !p.is_empty()) {
        Some(prefix) => {
            let hosts = if route.hostnames.len() > 1 {
                format!("({})", hosts)
            } else {
                hosts
            };
            format!("{} && PathPrefix(`{}`)", hosts, prefix)
        }
        None => hosts,
    }
}

/// Render every active route. Inactive routes are left out entirely.
pub fn render_routes<'a, I>(routes: I) -> DynamicConfig
where
    I: IntoIterator<Item = &'a ProxyRoute>,
{
    let mut http = HttpConfig::default();

    for route in routes.into_iter().filter(|r| r.is_active()) {
        let key = route_key(route);

        let mut middlewares = Vec::new();
        if let Some(prefix) = route.path_prefix.as_deref().filter(|p| !p.is_empty()) {
            if route.strip_prefix {
                let name = format!("{}-strip", key);
                http.middlewares.insert(
                    name.clone(),
                    Middleware {
                        strip_prefix: StripPrefix {
                            prefixes: vec![prefix.to_string()],
                        },
                    },
                );
                middlewares.push(name);
            }
        }

        let tls = route.tls_enabled().then(|| RouterTls {
            cert_resolver: route.tls.as_ref().and_then(|tls| tls.cert_resolver.clone()),
        });

        http.routers.insert(
            key.clone(),
            Router {
                rule: route_rule(route),
                service: key.clone(),
                middlewares,
                tls,
            },
        );

        let health_check = route
            .health_check
            .as_ref()
            .filter(|hc| hc.enabled)
            .map(|hc| HealthCheck {
                path: hc.path.clone(),
                interval: hc.interval.clone(),
                timeout: hc.timeout.clone(),
                retries: hc.retries,
            });

        http.services.insert(
            key,
            Service {
                load_balancer: LoadBalancer {
                    servers: vec![Server {
                        url: route.target_url.clone(),
                    }],
                    health_check,
                },
            },
        );
    }

    DynamicConfig { http }
}
