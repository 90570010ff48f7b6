//! Python 3 worker template (standard library only).

use super::template::{
    WorkerParams, WorkerTemplate, EXIT_PARTIAL, EXIT_UNREACHABLE, WORKER_PROTOCOL_VERSION,
};

const PYTHON_WORKER: &str = r##"# tilegen-worker protocol=@@VERSION@@ template=python
import os
import sys
import time
import urllib.error
import urllib.request

PROTOCOL = @@VERSION@@
ENDPOINT = @@ENDPOINT@@
PROJECT_DIR = @@PROJECT_DIR@@
ATTEMPTS = @@ATTEMPTS@@
BACKOFF_SECS = @@BACKOFF_SECS@@
REQUEST_TIMEOUT = @@REQUEST_TIMEOUT@@
TOTAL = @@TOTAL@@
EXIT_PARTIAL = @@EXIT_PARTIAL@@
EXIT_UNREACHABLE = @@EXIT_UNREACHABLE@@

# (zoom, y, x_start, x_end) rows in plan order
RUNS = [
@@RUNS@@
]


def emit(line):
    sys.stdout.write(line + "\n")
    sys.stdout.flush()


def fetch(url):
    """Returns (body, reason, reached_server)."""
    try:
        with urllib.request.urlopen(url, timeout=REQUEST_TIMEOUT) as resp:
            # file:// responses carry no status
            status = resp.getcode() or 200
            body = resp.read()
    except urllib.error.HTTPError as e:
        return None, "http_%d" % e.code, True
    except Exception as e:
        return None, "transport_%s" % type(e).__name__, False
    if status < 200 or status >= 300:
        return None, "http_%d" % status, True
    if not body:
        return None, "empty_body", True
    return body, None, True


def store(path, body):
    os.makedirs(os.path.dirname(path), exist_ok=True)
    part = path + ".part"
    with open(part, "wb") as f:
        f.write(body)
    os.replace(part, path)


def main():
    emit("# tilegen-worker protocol=%d tiles=%d" % (PROTOCOL, TOTAL))
    ok = 0
    err = 0
    fetched = False
    reached = False
    zoom = None
    for z, y, x_start, x_end in RUNS:
        if z != zoom:
            emit("# zoom %d" % z)
            zoom = z
        for x in range(x_start, x_end + 1):
            path = os.path.join(PROJECT_DIR, str(z), str(x), "%d.png" % y)
            if os.path.isfile(path) and os.path.getsize(path) > 0:
                ok += 1
                emit("TILE_OK %d %d %d" % (z, x, y))
                continue
            url = "%s/%d/%d/%d.png" % (ENDPOINT, z, x, y)
            reason = "not_attempted"
            stored = False
            for attempt in range(ATTEMPTS):
                fetched = True
                body, reason, hit = fetch(url)
                reached = reached or hit
                if body is not None:
                    try:
                        store(path, body)
                        stored = True
                        break
                    except OSError as e:
                        reason = "write_%s" % type(e).__name__
                if attempt + 1 < ATTEMPTS:
                    time.sleep(BACKOFF_SECS)
            if stored:
                ok += 1
                emit("TILE_OK %d %d %d" % (z, x, y))
            else:
                err += 1
                emit("TILE_ERR %d %d %d %s" % (z, x, y, reason))
    emit("DONE total=%d ok=%d err=%d" % (ok + err, ok, err))
    if err == 0:
        return 0
    if fetched and not reached:
        return EXIT_UNREACHABLE
    return EXIT_PARTIAL


if __name__ == "__main__":
    try:
        sys.exit(main())
    except KeyboardInterrupt:
        sys.exit(130)
"##;

/// Renders workers for a Python 3 interpreter, as found in the rendering
/// stack's tools container.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonTemplate;

impl WorkerTemplate for PythonTemplate {
    fn name(&self) -> &'static str {
        "python"
    }

    fn default_launcher(&self) -> Vec<String> {
        vec!["python3".into(), "-u".into(), "-".into()]
    }

    fn render(&self, params: &WorkerParams<'_>) -> String {
        let runs = params
            .runs
            .iter()
            .map(|run| {
                let [z, y, x0, x1] = run.as_tuple();
                format!("    ({}, {}, {}, {}),", z, y, x0, x1)
            })
            .collect::<Vec<_>>()
            .join("\n");

        PYTHON_WORKER
            .replace("@@VERSION@@", &WORKER_PROTOCOL_VERSION.to_string())
            .replace("@@ENDPOINT@@", &string_literal(params.endpoint_base_url))
            .replace(
                "@@PROJECT_DIR@@",
                &string_literal(&params.project_dir.to_string_lossy()),
            )
            .replace("@@ATTEMPTS@@", &params.fetch.attempts.max(1).to_string())
            .replace(
                "@@BACKOFF_SECS@@",
                &format!("{:?}", params.fetch.backoff.as_secs_f64()),
            )
            .replace(
                "@@REQUEST_TIMEOUT@@",
                &format!("{:?}", params.fetch.request_timeout.as_secs_f64()),
            )
            .replace("@@TOTAL@@", &params.tile_count.to_string())
            .replace("@@EXIT_PARTIAL@@", &EXIT_PARTIAL.to_string())
            .replace("@@EXIT_UNREACHABLE@@", &EXIT_UNREACHABLE.to_string())
            .replace("@@RUNS@@", &runs)
    }
}

/// JSON string literals are valid Python string literals.
fn string_literal(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}
