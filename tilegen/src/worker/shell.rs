//! POSIX shell + curl worker template.
//!
//! For environments without a Python interpreter. The program runs under
//! `sh -s` and needs `curl`, `mkdir`, `mv` and `sleep`.

use std::fmt::Write;

use super::template::{
    WorkerParams, WorkerTemplate, EXIT_PARTIAL, EXIT_UNREACHABLE, WORKER_PROTOCOL_VERSION,
};

const SHELL_HEADER: &str = r##"# tilegen-worker protocol=@@VERSION@@ template=shell
ENDPOINT=@@ENDPOINT@@
PROJECT_DIR=@@PROJECT_DIR@@
ATTEMPTS=@@ATTEMPTS@@
BACKOFF_SECS=@@BACKOFF_SECS@@
REQUEST_TIMEOUT=@@REQUEST_TIMEOUT@@
TOTAL=@@TOTAL@@
ok=0
err=0
fetched=0
reached=0

echo "# tilegen-worker protocol=@@VERSION@@ tiles=$TOTAL"

# fetch_tile Z X Y
fetch_tile() {
    dir="$PROJECT_DIR/$1/$2"
    path="$dir/$3.png"
    if [ -s "$path" ]; then
        ok=$((ok + 1))
        echo "TILE_OK $1 $2 $3"
        return 0
    fi
    reason=not_attempted
    attempt=1
    while [ "$attempt" -le "$ATTEMPTS" ]; do
        fetched=1
        if mkdir -p "$dir" 2>/dev/null; then
            code=$(curl -s -L -o "$path.part" -w '%{http_code}' --max-time "$REQUEST_TIMEOUT" \
                "$ENDPOINT/$1/$2/$3.png" </dev/null)
            rc=$?
            if [ "$rc" -ne 0 ]; then
                reason="transport_curl_$rc"
            else
                reached=1
                # file:// transfers report 000
                case "$code" in
                    2??|000)
                        if [ ! -s "$path.part" ]; then
                            reason=empty_body
                        elif mv -f "$path.part" "$path"; then
                            ok=$((ok + 1))
                            echo "TILE_OK $1 $2 $3"
                            return 0
                        else
                            reason=write_failed
                        fi
                        ;;
                    *)
                        reason="http_$code"
                        ;;
                esac
            fi
            rm -f "$path.part"
        else
            reason=mkdir_failed
        fi
        if [ "$attempt" -lt "$ATTEMPTS" ]; then
            sleep "$BACKOFF_SECS"
        fi
        attempt=$((attempt + 1))
    done
    err=$((err + 1))
    echo "TILE_ERR $1 $2 $3 $reason"
}

# run Z Y X_START X_END
run() {
    x=$3
    while [ "$x" -le "$4" ]; do
        fetch_tile "$1" "$x" "$2"
        x=$((x + 1))
    done
}

"##;

const SHELL_FOOTER: &str = r#"
echo "DONE total=$((ok + err)) ok=$ok err=$err"
if [ "$err" -eq 0 ]; then
    exit 0
fi
if [ "$fetched" -eq 1 ] && [ "$reached" -eq 0 ]; then
    exit @@EXIT_UNREACHABLE@@
fi
exit @@EXIT_PARTIAL@@
"#;

/// Renders workers for a POSIX shell with `curl` available.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellCurlTemplate;

impl WorkerTemplate for ShellCurlTemplate {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn default_launcher(&self) -> Vec<String> {
        vec!["sh".into(), "-s".into()]
    }

    fn render(&self, params: &WorkerParams<'_>) -> String {
        let mut body = String::new();
        let mut zoom = None;
        for run in params.runs {
            if zoom != Some(run.zoom) {
                let _ = writeln!(body, "echo \"# zoom {}\"", run.zoom);
                zoom = Some(run.zoom);
            }
            let [z, y, x0, x1] = run.as_tuple();
            let _ = writeln!(body, "run {} {} {} {}", z, y, x0, x1);
        }

        let header = SHELL_HEADER
            .replace("@@VERSION@@", &WORKER_PROTOCOL_VERSION.to_string())
            .replace("@@ENDPOINT@@", &single_quote(params.endpoint_base_url))
            .replace(
                "@@PROJECT_DIR@@",
                &single_quote(&params.project_dir.to_string_lossy()),
            )
            .replace("@@ATTEMPTS@@", &params.fetch.attempts.max(1).to_string())
            .replace(
                "@@BACKOFF_SECS@@",
                &params.fetch.backoff.as_secs_f64().to_string(),
            )
            .replace(
                "@@REQUEST_TIMEOUT@@",
                &params.fetch.request_timeout.as_secs().max(1).to_string(),
            )
            .replace("@@TOTAL@@", &params.tile_count.to_string());
        let footer = SHELL_FOOTER
            .replace("@@EXIT_PARTIAL@@", &EXIT_PARTIAL.to_string())
            .replace("@@EXIT_UNREACHABLE@@", &EXIT_UNREACHABLE.to_string());

        header + &body + &footer
    }
}

/// Quotes a value for POSIX sh: `it's` becomes `'it'\''s'`.
fn single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
