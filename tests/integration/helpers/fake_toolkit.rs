//! A shell-script stand-in for `bcftools`.
//!
//! Supports the three invocations the watchdog makes: `view -Oz -o` to compress,
//! `index`, and `view [-H] <path> [-r <region>]` to stream records. Region views
//! print the whole body; the record stream narrows it to the region.
//!
//! Every `view` records its pid. On start it also records, as an overlap, any earlier
//! view that is still alive or not yet reaped.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// One fake toolkit installation in a scratch directory.
pub struct FakeBcftools {
    pub program: PathBuf,
    invocations: PathBuf,
    overlaps: PathBuf,
}

impl FakeBcftools {
    /// Install the fake toolkit into `dir`. With `hang_on_region`, region views print
    /// nothing and never finish.
    pub fn install(dir: &Path, hang_on_region: bool) -> Self {
        let program = dir.join("fake-bcftools");
        let invocations = dir.join("bcftools-invocations.txt");
        let pids = dir.join("bcftools-pids.txt");
        let overlaps = dir.join("bcftools-overlaps.txt");
        let hang = if hang_on_region { r#"[ -n "$region" ] && exec sleep 30"# } else { ":" };
        let script = format!(
            r#"#!/bin/sh
echo "$@" >> '{invocations}'
cmd="$1"
shift
case "$cmd" in
  index)
    : > "$1.csi"
    ;;
  view)
    for pid in $(cat '{pids}' 2>/dev/null); do
      if kill -0 "$pid" 2>/dev/null; then echo "$pid" >> '{overlaps}'; fi
    done
    echo $$ >> '{pids}'
    header=yes; region=; out=; input=
    while [ $# -gt 0 ]; do
      case "$1" in
        -H) header=no ;;
        -r) region="$2"; shift ;;
        -o) out="$2"; shift ;;
        -Oz) ;;
        *) input="$1" ;;
      esac
      shift
    done
    if [ -n "$out" ]; then
      gzip -dcf "$input" | gzip -c > "$out"
      exit $?
    fi
    {hang}
    if [ "$header" = yes ]; then
      gzip -dcf "$input"
    else
      gzip -dcf "$input" | sed '/^#/d'
    fi
    ;;
  *)
    echo "unsupported command: $cmd" >&2
    exit 1
    ;;
esac
"#,
            invocations = invocations.display(),
            pids = pids.display(),
            overlaps = overlaps.display(),
        );
        std::fs::write(&program, script).unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
        Self { program, invocations, overlaps }
    }

    /// The argument lists of every invocation so far.
    pub fn invocations(&self) -> Vec<String> {
        read_lines_or_empty(&self.invocations)
    }

    /// Pids of views that were still running when a later view started.
    pub fn overlaps(&self) -> Vec<String> {
        read_lines_or_empty(&self.overlaps)
    }
}

fn read_lines_or_empty(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path).unwrap_or_default().lines().map(ToString::to_string).collect()
}
