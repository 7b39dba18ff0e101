fn main() {
    // PDFium is bound at runtime, nothing to link here. Lookup order:
    // ./libpdfium, vendor/pdfium/lib/, then system library paths.
    println!("cargo:rerun-if-changed=build.rs");
}
