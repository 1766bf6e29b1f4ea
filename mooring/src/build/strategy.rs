//! Build strategies: one per buildpack variant

use crate::build::script::shell_quote;
use crate::build::types::{
    BuildpackConfig, ComposeConfig, DockerfileConfig, NixpacksConfig, StaticConfig,
};
use crate::storage::settings::BuilderSettings;

/// Turns a buildpack config into commands for the build helper.
pub trait BuildStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Image the helper container runs
    fn helper_image(&self, settings: &BuilderSettings) -> String;

    /// Commands run from the context root, producing `image_tag`
    fn commands(&self, image_tag: &str) -> Vec<String>;
}

impl BuildpackConfig {
    pub fn strategy(&self) -> &dyn BuildStrategy {
        match self {
            BuildpackConfig::Nixpacks(config) => config,
            BuildpackConfig::Static(config) => config,
            BuildpackConfig::Dockerfile(config) => config,
            BuildpackConfig::DockerCompose(config) => config,
        }
    }
}

impl BuildStrategy for NixpacksConfig {
    fn name(&self) -> &'static str {
        "nixpacks"
    }

    fn helper_image(&self, settings: &BuilderSettings) -> String {
        settings.nixpacks_image.clone()
    }

    fn commands(&self, image_tag: &str) -> Vec<String> {
        let mut command = format!("nixpacks build . --name {}", shell_quote(image_tag));
        let flags = [
            ("--install-cmd", &self.install_command),
            ("--build-cmd", &self.build_command),
            ("--start-cmd", &self.start_command),
        ];
        for (flag, value) in flags {
            if let Some(value) = value {
                command.push_str(&format!(" {} {}", flag, shell_quote(value)));
            }
        }
        for (key, value) in &self.variables {
            command.push_str(&format!(" --env {}", shell_quote(&format!("{}={}", key, value))));
        }
        vec!["echo 'Building with Nixpacks...'".to_string(), command]
    }
}

impl StaticConfig {
    /// Two-stage Dockerfile: node build, nginx runtime
    pub fn dockerfile(&self) -> String {
        let mut lines = vec![
            "FROM node:18-alpine AS builder".to_string(),
            "WORKDIR /app".to_string(),
            "COPY package*.json ./".to_string(),
            "RUN npm ci".to_string(),
            "COPY . .".to_string(),
            format!("RUN {}", self.build_command),
            String::new(),
            "FROM nginx:alpine".to_string(),
            format!(
                "COPY --from=builder /app/{} /usr/share/nginx/html",
                self.output_dir.trim_matches('/')
            ),
        ];
        if let Some(nginx) = &self.nginx_config {
            lines.push(format!("COPY {} /etc/nginx/conf.d/default.conf", nginx));
        }
        lines.push("EXPOSE 80".to_string());
        lines.push(r#"CMD ["nginx", "-g", "daemon off;"]"#.to_string());
        let mut dockerfile = lines.join("\n");
        dockerfile.push('\n');
        dockerfile
    }
}

impl BuildStrategy for StaticConfig {
    fn name(&self) -> &'static str {
        "static"
    }

    fn helper_image(&self, settings: &BuilderSettings) -> String {
        settings.docker_image.clone()
    }

    fn commands(&self, image_tag: &str) -> Vec<String> {
        vec![
            "echo 'Building static site...'".to_string(),
            format!("printf '%s' {} > Dockerfile", shell_quote(&self.dockerfile())),
            format!("docker build -t {} .", shell_quote(image_tag)),
        ]
    }
}

impl BuildStrategy for DockerfileConfig {
    fn name(&self) -> &'static str {
        "dockerfile"
    }

    fn helper_image(&self, settings: &BuilderSettings) -> String {
        settings.docker_image.clone()
    }

    fn commands(&self, image_tag: &str) -> Vec<String> {
        let mut command = format!("docker build -f {}", shell_quote(&self.dockerfile_path));
        for (key, value) in &self.build_args {
            command.push_str(&format!(
                " --build-arg {}",
                shell_quote(&format!("{}={}", key, value))
            ));
        }
        if let Some(target) = &self.target {
            command.push_str(&format!(" --target {}", shell_quote(target)));
        }
        command.push_str(&format!(" -t {} .", shell_quote(image_tag)));
        vec!["echo 'Building with Dockerfile...'".to_string(), command]
    }
}

impl BuildStrategy for ComposeConfig {
    fn name(&self) -> &'static str {
        "docker_compose"
    }

    fn helper_image(&self, settings: &BuilderSettings) -> String {
        settings.docker_image.clone()
    }

    fn commands(&self, _image_tag: &str) -> Vec<String> {
        let mut command = format!("docker-compose -f {} build", shell_quote(&self.compose_file));
        if let Some(service) = &self.service {
            command.push_str(&format!(" {}", shell_quote(service)));
        }
        vec!["echo 'Building with Docker Compose...'".to_string(), command]
    }
}
