use std::path::PathBuf;

/// Name of the mpv control endpoint for this process.  The pid keeps
/// concurrent instances from fighting over the same socket.
#[cfg(unix)]
pub fn mpv_socket_name() -> String {
    format!(
        "{}/radio-mpv{}.sock",
        std::env::temp_dir().display(),
        std::process::id()
    )
}

#[cfg(windows)]
pub fn mpv_socket_name() -> String {
    format!("radio-mpv{}", std::process::id())
}

/// Full address as mpv expects it on the command line.
#[cfg(unix)]
pub fn mpv_socket_address(name: &str) -> String {
    name.to_string()
}

#[cfg(windows)]
pub fn mpv_socket_address(name: &str) -> String {
    format!(r"\\.\pipe\{}", name)
}

pub fn data_dir() -> PathBuf {
    // On macOS and Linux, use ~/.local/share/radio/ (XDG standard)
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join("radio")
    }
    #[cfg(windows)]
    {
        // Portable install: data/ beside the executable wins
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let portable_data = exe_dir.join("data");
                if portable_data.exists() {
                    return portable_data;
                }
            }
        }

        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("radio")
    }
}

pub fn config_dir() -> PathBuf {
    #[cfg(windows)]
    {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let portable_config = exe_dir.join("config.toml");
                if portable_config.exists() {
                    return exe_dir.to_path_buf();
                }
            }
        }
    }

    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("radio")
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("radio")
    }
}

#[cfg(unix)]
pub fn mpv_binary_name() -> &'static str {
    "mpv"
}

#[cfg(windows)]
pub fn mpv_binary_name() -> &'static str {
    "mpv.exe"
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|p| p.exists())
}

/// Find mpv: beside the current executable first, then on PATH.
pub fn find_mpv_binary() -> Option<PathBuf> {
    let exe_name = mpv_binary_name();

    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(dir) = current_exe.parent() {
            let local_mpv = dir.join(exe_name);
            if local_mpv.exists() {
                return Some(local_mpv);
            }
        }
    }

    find_on_path(exe_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_name_is_per_process() {
        let name = mpv_socket_name();
        assert!(name.contains(&std::process::id().to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_socket_address_is_path_on_unix() {
        assert_eq!(mpv_socket_address("/tmp/x.sock"), "/tmp/x.sock");
    }
}
