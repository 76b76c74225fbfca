/**
 * ============================================================================
 * SERVICE ALLOW-LIST
 * ============================================================================
 *
 * PURPOSE: Compiled-in table of every service the app may query or control
 *
 * Nothing outside this table ever reaches the OS service manager. Lookups
 * are exact: a canonical name ("redis") or its systemd unit
 * ("redis.service"). No normalisation beyond trimming whitespace.
 *
 * ============================================================================
 */

use serde::Serialize;

/**
 * Which service manager instance owns the unit
 * User units run under the operator's own session and never need elevation
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitScope {
    System,
    User,
}

/**
 * One allow-listed service
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KnownService {
    pub name: &'static str,
    pub unit: &'static str,
    pub launchd_label: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub scope: UnitScope,
}

impl KnownService {
    pub fn category(&self) -> &'static str {
        infer_category(self.name)
    }
}

const fn system(
    name: &'static str,
    unit: &'static str,
    launchd_label: &'static str,
    display_name: &'static str,
    description: &'static str,
) -> KnownService {
    KnownService {
        name,
        unit,
        launchd_label,
        display_name,
        description,
        scope: UnitScope::System,
    }
}

const fn user(
    name: &'static str,
    unit: &'static str,
    launchd_label: &'static str,
    display_name: &'static str,
    description: &'static str,
) -> KnownService {
    KnownService {
        name,
        unit,
        launchd_label,
        display_name,
        description,
        scope: UnitScope::User,
    }
}

pub const KNOWN_SERVICES: &[KnownService] = &[
    system("redis", "redis.service", "homebrew.mxcl.redis", "Redis", "In-memory key-value store"),
    system("memcached", "memcached.service", "homebrew.mxcl.memcached", "Memcached", "Distributed memory cache"),
    system("postgresql", "postgresql.service", "homebrew.mxcl.postgresql", "PostgreSQL", "Relational database server"),
    system("mysql", "mysql.service", "homebrew.mxcl.mysql", "MySQL", "Relational database server"),
    system("mariadb", "mariadb.service", "homebrew.mxcl.mariadb", "MariaDB", "Relational database server"),
    system("mongodb", "mongod.service", "homebrew.mxcl.mongodb-community", "MongoDB", "Document database server"),
    system("influxdb", "influxdb.service", "homebrew.mxcl.influxdb", "InfluxDB", "Time series database"),
    system("elasticsearch", "elasticsearch.service", "homebrew.mxcl.elasticsearch", "Elasticsearch", "Search and analytics engine"),
    system("nginx", "nginx.service", "homebrew.mxcl.nginx", "Nginx", "HTTP server and reverse proxy"),
    system("apache2", "apache2.service", "homebrew.mxcl.httpd", "Apache HTTP Server", "HTTP server"),
    system("caddy", "caddy.service", "homebrew.mxcl.caddy", "Caddy", "HTTP server with automatic TLS"),
    system("rabbitmq", "rabbitmq-server.service", "homebrew.mxcl.rabbitmq", "RabbitMQ", "AMQP message broker"),
    system("kafka", "kafka.service", "homebrew.mxcl.kafka", "Apache Kafka", "Distributed event streaming platform"),
    system("mosquitto", "mosquitto.service", "homebrew.mxcl.mosquitto", "Mosquitto", "MQTT message broker"),
    system("docker", "docker.service", "com.docker.vmnetd", "Docker", "Container engine"),
    system("prometheus", "prometheus.service", "homebrew.mxcl.prometheus", "Prometheus", "Metrics collection and alerting"),
    system("grafana", "grafana-server.service", "homebrew.mxcl.grafana", "Grafana", "Metrics dashboards"),
    system("minio", "minio.service", "homebrew.mxcl.minio", "MinIO", "S3-compatible object storage"),
    system("jenkins", "jenkins.service", "homebrew.mxcl.jenkins-lts", "Jenkins", "Automation server"),
    user("syncthing", "syncthing.service", "homebrew.mxcl.syncthing", "Syncthing", "Continuous file synchronisation"),
    user("podman", "podman.socket", "homebrew.mxcl.podman", "Podman API", "Rootless container API socket"),
];

/**
 * Resolve a canonical name or unit name to its allow-list entry
 */
pub fn resolve(name: &str) -> Option<&'static KnownService> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    KNOWN_SERVICES
        .iter()
        .find(|known| known.name == name || known.unit == name)
}

pub fn is_known(name: &str) -> bool {
    resolve(name).is_some()
}

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("Web Server", &["nginx", "apache", "httpd", "caddy", "traefik", "haproxy"]),
    ("Cache", &["redis", "memcache", "cache"]),
    ("Database", &["postgres", "mysql", "mariadb", "sqlite", "mongo", "influx", "clickhouse"]),
    ("Message Broker", &["kafka", "rabbitmq", "mosquitto", "nats", "mq", "queue"]),
    ("Container", &["docker", "containerd", "podman"]),
    ("Monitoring", &["prometheus", "grafana", "jaeger", "monitor", "metric"]),
    ("Search", &["elasticsearch", "opensearch", "solr", "meilisearch", "search"]),
    ("Storage", &["minio", "ceph", "samba", "nfs", "sync"]),
    ("CI/CD", &["jenkins", "gitlab", "drone", "runner"]),
];

/**
 * Keyword based category for a service name, "Other" when nothing matches
 */
pub fn infer_category(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or("Other")
}
