//! Generate `include/webcall.h` from the `extern "C"` surface.
//!
//! Header generation is best effort: a failure is reported as a cargo
//! warning and never fails the build.

fn main() {
    println!("cargo:rerun-if-changed=src");

    let Ok(crate_dir) = std::env::var("CARGO_MANIFEST_DIR") else {
        return;
    };
    let generated = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("WEBCALL_H")
        .with_cpp_compat(true)
        .generate();

    match generated {
        Ok(bindings) => {
            bindings.write_to_file(format!("{crate_dir}/include/webcall.h"));
        }
        Err(e) => println!("cargo:warning=webcall.h not generated: {e}"),
    }
}
