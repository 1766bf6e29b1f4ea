//! Routing labels read by the proxy's container provider

use std::collections::BTreeMap;

/// Labels that route `domain` to port `port` of the container named `name`.
pub fn routing_labels(
    name: &str,
    domain: &str,
    entrypoint: &str,
    port: u16,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("traefik.enable".to_string(), "true".to_string());
    labels.insert(
        format!("traefik.http.routers.{}.rule", name),
        host_rule(&[domain]),
    );
    labels.insert(
        format!("traefik.http.routers.{}.entrypoints", name),
        entrypoint.to_string(),
    );
    labels.insert(
        format!("traefik.http.services.{}.loadbalancer.server.port", name),
        port.to_string(),
    );
    labels
}

/// `Host(...)` matcher for one or more hostnames.
pub fn host_rule<S: AsRef<str>>(hostnames: &[S]) -> String {
    let hosts: Vec<String> = hostnames
        .iter()
        .map(|host| format!("Host(`{}`)", host.as_ref()))
        .collect();
    hosts.join(" || ")
}
