//! Container configuration for application deployments

use std::collections::BTreeMap;

use crate::containers::manager::WorkloadDescriptor;
use crate::models::application::Application;
use crate::proxy::labels::routing_labels;
use crate::storage::settings::ProxySettings;
use crate::utils::container_name;

pub const RESTART_POLICY: &str = "unless-stopped";

/// Container port -> host port. Mappings without a host port publish on an
/// engine-assigned port.
pub fn port_map(application: &Application) -> BTreeMap<String, String> {
    application
        .port_mappings
        .iter()
        .map(|mapping| {
            (
                mapping.container_port.to_string(),
                mapping
                    .host_port
                    .map(|port| port.to_string())
                    .unwrap_or_default(),
            )
        })
        .collect()
}

/// Descriptor for deployment `deployment_number` of `application` running
/// `image_tag`.
pub fn application_workload(
    application: &Application,
    deployment_number: u32,
    image_tag: &str,
    proxy: &ProxySettings,
) -> WorkloadDescriptor {
    let name = container_name(&application.name, deployment_number);

    let labels = match application.routing_domain() {
        Some(domain) => {
            let port = application
                .exposed_ports
                .first()
                .copied()
                .unwrap_or(proxy.default_port);
            routing_labels(&name, domain, &proxy.entrypoint, port)
        }
        None => BTreeMap::new(),
    };

    WorkloadDescriptor {
        image: image_tag.to_string(),
        name,
        ports: port_map(application),
        environment: application.env_vars.clone(),
        volumes: application.volumes.clone(),
        networks: proxy.network.iter().cloned().collect(),
        restart_policy: Some(RESTART_POLICY.to_string()),
        labels,
        ..Default::default()
    }
}
