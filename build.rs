#[cfg(windows)]
fn main() {
    let mut res = winres::WindowsResource::new();
    if std::path::Path::new("icons/icon.ico").exists() {
        res.set_icon("icons/icon.ico");
    }
    res.set("ProductName", "Nox");
    res.set("FileDescription", "Nox - Screen Dimmer");
    res.set("LegalCopyright", "© 2025 Nox Contributors");
    res.set("CompanyName", "Nox");
    res.set("OriginalFilename", "nox.exe");

    if let Err(e) = res.compile() {
        eprintln!("Failed to compile Windows resource: {}", e);
    }
}

#[cfg(not(windows))]
fn main() {
}
