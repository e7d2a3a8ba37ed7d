//! Docker CLI wrapper
//!
//! All engine operations shell out to the `docker` binary with
//! `--format` templates and parse the pipe-delimited output. The engine is
//! the source of truth; nothing is cached here.

use thiserror::Error;
use tokio::process::Command;
use tracing::error;

use crate::domain::container::ContainerSummary;
use crate::domain::image::ImageSummary;
use crate::domain::network::NetworkSummary;
use crate::domain::stack::StackService;
use crate::domain::volume::VolumeSummary;
use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum DockerError {
    #[error("failed to run docker: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} not found")]
    NotFound(String),
    #[error("docker command failed: {0}")]
    Failed(String),
}

impl From<DockerError> for ApiError {
    fn from(err: DockerError) -> Self {
        match err {
            DockerError::NotFound(resource) => ApiError::not_found(resource),
            other => ApiError::internal(other.to_string()),
        }
    }
}

/// Thin handle around the Docker CLI
#[derive(Clone)]
pub struct Docker {
    bin: String,
}

impl Docker {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Run a docker command, returning stdout on success
    ///
    /// "No such ..." failures map to `NotFound` with the given resource
    /// label so handlers can produce a 404.
    pub async fn run(&self, args: &[&str], resource: &str) -> Result<String, DockerError> {
        let output = Command::new(&self.bin).args(args).output().await.map_err(|e| {
            error!(error = %e, args = ?args, "Failed to run docker");
            e
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("No such") || stderr.contains("not found") {
                return Err(DockerError::NotFound(resource.to_string()));
            }
            return Err(DockerError::Failed(stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    // ---- containers ----

    pub async fn list_containers(&self) -> Result<Vec<ContainerSummary>, DockerError> {
        let stdout = self
            .run(
                &[
                    "ps",
                    "-a",
                    "--format",
                    "{{.ID}}|{{.Names}}|{{.Image}}|{{.Status}}|{{.State}}|{{.CreatedAt}}|{{.Ports}}",
                ],
                "containers",
            )
            .await?;
        Ok(parse_container_lines(&stdout))
    }

    pub async fn inspect_container(&self, name: &str) -> Result<serde_json::Value, DockerError> {
        let stdout = self
            .run(&["inspect", name], &format!("Container '{}'", name))
            .await?;
        let parsed: Vec<serde_json::Value> =
            serde_json::from_str(&stdout).map_err(|e| DockerError::Failed(e.to_string()))?;
        parsed
            .into_iter()
            .next()
            .ok_or_else(|| DockerError::NotFound(format!("Container '{}'", name)))
    }

    pub async fn container_logs(
        &self,
        name: &str,
        tail: usize,
        timestamps: bool,
        since: Option<&str>,
    ) -> Result<Vec<String>, DockerError> {
        let tail_arg = tail.to_string();
        let mut args = vec!["logs", "--tail", &tail_arg];
        if timestamps {
            args.push("--timestamps");
        }
        if let Some(since) = since {
            args.push("--since");
            args.push(since);
        }
        args.push(name);

        // docker logs writes to both pipes, keep them in order of stdout
        // first since the CLI gives no interleaving guarantee anyway
        let output = Command::new(&self.bin).args(&args).output().await?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            if stderr.contains("No such container") {
                return Err(DockerError::NotFound(format!("Container '{}'", name)));
            }
            return Err(DockerError::Failed(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let logs = stdout
            .lines()
            .chain(stderr.lines())
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        Ok(logs)
    }

    pub async fn container_env(&self, name: &str) -> Result<Vec<(String, String)>, DockerError> {
        let stdout = self
            .run(
                &[
                    "inspect",
                    "--format",
                    "{{range .Config.Env}}{{.}}\n{{end}}",
                    name,
                ],
                &format!("Container '{}'", name),
            )
            .await?;
        Ok(stdout
            .lines()
            .filter(|line| !line.is_empty() && line.contains('='))
            .map(|line| {
                let mut parts = line.splitn(2, '=');
                (
                    parts.next().unwrap_or("").to_string(),
                    parts.next().unwrap_or("").to_string(),
                )
            })
            .collect())
    }

    pub async fn start_container(&self, name: &str) -> Result<(), DockerError> {
        self.run(&["start", name], &format!("Container '{}'", name))
            .await
            .map(|_| ())
    }

    pub async fn stop_container(&self, name: &str) -> Result<(), DockerError> {
        self.run(&["stop", name], &format!("Container '{}'", name))
            .await
            .map(|_| ())
    }

    pub async fn restart_container(&self, name: &str) -> Result<(), DockerError> {
        self.run(&["restart", name], &format!("Container '{}'", name))
            .await
            .map(|_| ())
    }

    pub async fn remove_container(&self, name: &str, force: bool) -> Result<(), DockerError> {
        let mut args = vec!["rm"];
        if force {
            args.push("-f");
        }
        args.push(name);
        self.run(&args, &format!("Container '{}'", name))
            .await
            .map(|_| ())
    }

    // ---- images ----

    pub async fn list_images(&self) -> Result<Vec<ImageSummary>, DockerError> {
        let stdout = self
            .run(
                &[
                    "images",
                    "--format",
                    "{{.ID}}|{{.Repository}}|{{.Tag}}|{{.Size}}|{{.CreatedSince}}",
                ],
                "images",
            )
            .await?;
        Ok(parse_image_lines(&stdout))
    }

    pub async fn remove_image(&self, reference: &str, force: bool) -> Result<(), DockerError> {
        let mut args = vec!["rmi"];
        if force {
            args.push("-f");
        }
        args.push(reference);
        self.run(&args, &format!("Image '{}'", reference))
            .await
            .map(|_| ())
    }

    pub async fn prune_images(&self) -> Result<String, DockerError> {
        self.run(&["image", "prune", "-f"], "images").await
    }

    // ---- networks ----

    pub async fn list_networks(&self) -> Result<Vec<NetworkSummary>, DockerError> {
        let stdout = self
            .run(
                &[
                    "network",
                    "ls",
                    "--format",
                    "{{.ID}}|{{.Name}}|{{.Driver}}|{{.Scope}}",
                ],
                "networks",
            )
            .await?;
        Ok(parse_network_lines(&stdout))
    }

    pub async fn create_network(
        &self,
        name: &str,
        driver: &str,
        internal: bool,
    ) -> Result<(), DockerError> {
        let mut args = vec!["network", "create", "--driver", driver];
        if internal {
            args.push("--internal");
        }
        args.push(name);
        self.run(&args, &format!("Network '{}'", name))
            .await
            .map(|_| ())
    }

    pub async fn remove_network(&self, name: &str) -> Result<(), DockerError> {
        self.run(&["network", "rm", name], &format!("Network '{}'", name))
            .await
            .map(|_| ())
    }

    pub async fn prune_networks(&self) -> Result<String, DockerError> {
        self.run(&["network", "prune", "-f"], "networks").await
    }

    // ---- volumes ----

    pub async fn list_volumes(&self) -> Result<Vec<VolumeSummary>, DockerError> {
        let stdout = self
            .run(
                &[
                    "volume",
                    "ls",
                    "--format",
                    "{{.Name}}|{{.Driver}}|{{.Mountpoint}}",
                ],
                "volumes",
            )
            .await?;
        Ok(parse_volume_lines(&stdout))
    }

    pub async fn create_volume(&self, name: &str, driver: &str) -> Result<(), DockerError> {
        self.run(
            &["volume", "create", "--driver", driver, name],
            &format!("Volume '{}'", name),
        )
        .await
        .map(|_| ())
    }

    pub async fn remove_volume(&self, name: &str) -> Result<(), DockerError> {
        self.run(&["volume", "rm", name], &format!("Volume '{}'", name))
            .await
            .map(|_| ())
    }

    pub async fn prune_volumes(&self) -> Result<String, DockerError> {
        self.run(&["volume", "prune", "-f"], "volumes").await
    }

    // ---- compose ----

    /// Prefer a standalone `docker-compose`, fall back to the plugin
    pub async fn detect_compose_command(&self) -> (String, Vec<String>) {
        let check = Command::new("which").arg("docker-compose").output().await;
        if check.map(|o| o.status.success()).unwrap_or(false) {
            ("docker-compose".to_string(), vec![])
        } else {
            (self.bin.clone(), vec!["compose".to_string()])
        }
    }

    pub async fn compose_services(
        &self,
        compose_file: &str,
        project: &str,
    ) -> Result<Vec<StackService>, DockerError> {
        let (cmd, base_args) = self.detect_compose_command().await;
        let mut args: Vec<&str> = base_args.iter().map(String::as_str).collect();
        args.extend([
            "-p",
            project,
            "-f",
            compose_file,
            "ps",
            "-a",
            "--format",
            "{{.Name}}|{{.State}}|{{.Status}}",
        ]);

        let output = Command::new(&cmd).args(&args).output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(DockerError::Failed(stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_stack_service_lines(&stdout))
    }
}

fn parse_container_lines(stdout: &str) -> Vec<ContainerSummary> {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let parts: Vec<&str> = line.split('|').collect();
            ContainerSummary {
                id: parts.first().unwrap_or(&"").to_string(),
                name: parts.get(1).unwrap_or(&"").to_string(),
                image: parts.get(2).unwrap_or(&"").to_string(),
                status: parts.get(3).unwrap_or(&"").to_string(),
                state: parts.get(4).unwrap_or(&"").to_string(),
                created: parts.get(5).unwrap_or(&"").to_string(),
                ports: parts
                    .get(6)
                    .unwrap_or(&"")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            }
        })
        .collect()
}

fn parse_image_lines(stdout: &str) -> Vec<ImageSummary> {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let parts: Vec<&str> = line.split('|').collect();
            ImageSummary {
                id: parts.first().unwrap_or(&"").to_string(),
                repository: parts.get(1).unwrap_or(&"").to_string(),
                tag: parts.get(2).unwrap_or(&"").to_string(),
                size: parts.get(3).unwrap_or(&"").to_string(),
                created: parts.get(4).unwrap_or(&"").to_string(),
            }
        })
        .collect()
}

fn parse_network_lines(stdout: &str) -> Vec<NetworkSummary> {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let parts: Vec<&str> = line.split('|').collect();
            NetworkSummary {
                id: parts.first().unwrap_or(&"").to_string(),
                name: parts.get(1).unwrap_or(&"").to_string(),
                driver: parts.get(2).unwrap_or(&"").to_string(),
                scope: parts.get(3).unwrap_or(&"").to_string(),
            }
        })
        .collect()
}

fn parse_volume_lines(stdout: &str) -> Vec<VolumeSummary> {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let parts: Vec<&str> = line.split('|').collect();
            VolumeSummary {
                name: parts.first().unwrap_or(&"").to_string(),
                driver: parts.get(1).unwrap_or(&"").to_string(),
                mountpoint: parts.get(2).map(|s| s.to_string()).filter(|s| !s.is_empty()),
            }
        })
        .collect()
}

fn parse_stack_service_lines(stdout: &str) -> Vec<StackService> {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let parts: Vec<&str> = line.split('|').collect();
            StackService {
                name: parts.first().unwrap_or(&"").to_string(),
                state: parts.get(1).unwrap_or(&"").to_string(),
                status: parts.get(2).unwrap_or(&"").to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_container_lines() {
        let out = "abc123|web-1|nginx:latest|Up 2 hours|running|2026-08-01 10:00:00|0.0.0.0:8080->80/tcp, :::8080->80/tcp\n";
        let containers = parse_container_lines(out);
        assert_eq!(containers.len(), 1);
        let c = &containers[0];
        assert_eq!(c.name, "web-1");
        assert_eq!(c.state, "running");
        assert_eq!(c.ports.len(), 2);
        assert_eq!(c.ports[0], "0.0.0.0:8080->80/tcp");
    }

    #[test]
    fn test_parse_container_lines_tolerates_missing_fields() {
        let containers = parse_container_lines("abc|only-name\n\n");
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].name, "only-name");
        assert_eq!(containers[0].image, "");
        assert!(containers[0].ports.is_empty());
    }

    #[test]
    fn test_parse_image_lines() {
        let out = "sha1|nginx|latest|187MB|2 weeks ago\nsha2|redis|7|117MB|3 days ago\n";
        let images = parse_image_lines(out);
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].repository, "redis");
        assert_eq!(images[1].tag, "7");
    }

    #[test]
    fn test_parse_volume_lines_empty_mountpoint() {
        let volumes = parse_volume_lines("data|local|\n");
        assert_eq!(volumes[0].name, "data");
        assert_eq!(volumes[0].mountpoint, None);
    }

    #[test]
    fn test_parse_stack_service_lines() {
        let out = "blog-web-1|running|Up 5 minutes\nblog-db-1|exited|Exited (0) 2 minutes ago\n";
        let services = parse_stack_service_lines(out);
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].state, "running");
        assert_eq!(services[1].name, "blog-db-1");
    }
}
