pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# ALERTSTREAM CONFIGURATION
# =============================================================================
# Polls an alert feed, stores new alerts as events, and emits collector health
# events ("Event Collection Problem") while the feed is unreachable.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/alertstream/config.yml
#   3. /etc/alertstream/config.yml
#
# String values may reference environment variables using the $env syntax.

# =============================================================================
# FEED
# =============================================================================
feed:
  # Endpoint returning {generationID, messages: [...]} for
  # ?generationID=<id>&fromIndex=<n>
  url: https://alerts-prometheus.example.com/topics/alerts
  # Bearer token (optional), usually taken from the environment
  # token: <token>
  verify_ssl: true
  timeout: 30s

# =============================================================================
# MANAGER
# =============================================================================
# Owner of the stored events and of the outage start time.
manager:
  id: monitoring-1

# =============================================================================
# STREAM
# =============================================================================
stream:
  # Wait between successful fetches (0s polls back-to-back)
  poll_interval: 1s
  # First wait after a failed fetch; doubles per failure, capped at 60s
  retry_interval: 5s
  # Batches buffered between the reader and the event writer
  channel_capacity: 16

# =============================================================================
# STORAGE
# =============================================================================
storage:
  path: ~/.local/share/alertstream/events.duckdb
"#
    .to_string()
}
