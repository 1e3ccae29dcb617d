// ABOUTME: Renders the per-target routing definition from a merged topology.
// ABOUTME: Output is byte-for-byte reproducible given the same merge input order.

use crate::exec::Target;

use super::Topology;

/// Where the rendered routing definition lands on each target. The reverse
/// proxy reloads it after every rollout.
pub const ROUTING_PATH: &str = "/etc/nginx/conf.d/flotilla.conf";

/// Render the unified service/routing definition for one target.
///
/// Derived solely from the topology; entries appear in merge order so that
/// regenerating from the same topology yields identical bytes.
pub fn render_routing(topology: &Topology, target: &Target) -> String {
    let mut out = String::from(
        "# Generated by flotilla. Regenerated on every rollout; do not edit.\n",
    );

    for entry in topology.entries_for_target(target) {
        out.push_str(&format!(
            r#"
# {key}
server {{
    listen 80;
    server_name {domain};

    location {health} {{
        proxy_pass http://127.0.0.1:{port}{health};
        access_log off;
    }}

    location / {{
        proxy_pass http://127.0.0.1:{port};
        proxy_set_header Host $host;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
    }}
}}
"#,
            key = entry.key,
            domain = entry.domain,
            port = entry.port,
            health = entry.health_check,
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::EnvironmentSpec;
    use crate::topology::{MergeOptions, merge};

    fn merged_topology() -> Topology {
        let a = EnvironmentSpec::from_yaml(
            "name: api\nenvironments:\n  staging:\n    domain: a.example.com\n",
        )
        .unwrap();
        let b = EnvironmentSpec::from_yaml(
            "name: web\nenvironments:\n  staging:\n    domain: b.example.com\n",
        )
        .unwrap();
        merge(&[a, b], MergeOptions::default()).unwrap().topology
    }

    #[test]
    fn rendering_is_reproducible() {
        let topology = merged_topology();
        let first = render_routing(&topology, &Target::Local);
        let second = render_routing(&topology, &Target::Local);
        assert_eq!(first, second);
    }

    #[test]
    fn rendered_output_contains_each_domain_once() {
        let topology = merged_topology();
        let rendered = render_routing(&topology, &Target::Local);
        assert_eq!(rendered.matches("server_name a.example.com;").count(), 1);
        assert_eq!(rendered.matches("server_name b.example.com;").count(), 1);
        assert!(rendered.contains("proxy_pass http://127.0.0.1:3001;"));
        assert!(rendered.contains("proxy_pass http://127.0.0.1:3002;"));
    }

    #[test]
    fn only_entries_for_the_target_are_rendered() {
        let a = EnvironmentSpec::from_yaml(
            "name: api\nenvironments:\n  staging:\n    domain: a.example.com\n    server: deploy@web1.example.com\n",
        )
        .unwrap();
        let b = EnvironmentSpec::from_yaml(
            "name: web\nenvironments:\n  staging:\n    domain: b.example.com\n",
        )
        .unwrap();
        let merged = merge(&[a, b], MergeOptions::default()).unwrap();

        let rendered = render_routing(&merged.topology, &Target::Local);
        assert!(!rendered.contains("a.example.com"));
        assert!(rendered.contains("b.example.com"));
    }
}
