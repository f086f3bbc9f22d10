//! MPSoC loader build script
//!
//! Host builds (tests) need nothing. Bare-metal builds compile the FatFs shim
//! against the Xilinx BSP and link the BSP's `xilffs` and `xil` libraries.

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=csrc/");
    println!("cargo:rerun-if-env-changed=XILINX_BSP_DIR");
    println!("cargo:rerun-if-env-changed=MPSOC_LINKER_SCRIPT");

    if env::var("CARGO_CFG_TARGET_OS").unwrap_or_default() != "none" {
        return;
    }

    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    build_storage_shim(&arch);
    configure_linker(&arch);
}

fn build_storage_shim(arch: &str) {
    let bsp = PathBuf::from(
        env::var("XILINX_BSP_DIR")
            .expect("XILINX_BSP_DIR must point at the standalone BSP (include/ and lib/)"),
    );

    let mut build = cc::Build::new();
    build
        .file("csrc/ff_shim.c")
        .include(bsp.join("include"))
        .flag_if_supported("-ffreestanding")
        .flag_if_supported("-fno-builtin")
        .warnings(true);

    match arch {
        "aarch64" => {
            build.flag_if_supported("-mgeneral-regs-only");
            build.flag_if_supported("-mstrict-align");
        }
        "arm" => {
            build.flag_if_supported("-mcpu=cortex-r5");
            build.flag_if_supported("-mfloat-abi=hard");
        }
        _ => {}
    }
    build.compile("ff_shim");

    println!("cargo:rustc-link-search=native={}", bsp.join("lib").display());
    println!("cargo:rustc-link-lib=static=xilffs");
    println!("cargo:rustc-link-lib=static=xil");
}

fn configure_linker(arch: &str) {
    println!("cargo:rustc-link-arg=-nostdlib");
    println!("cargo:rustc-link-arg=-static");

    match env::var("MPSOC_LINKER_SCRIPT") {
        Ok(script) => println!("cargo:rustc-link-arg=-T{}", script),
        Err(_) => println!(
            "cargo:warning=MPSOC_LINKER_SCRIPT not set; linking {} image with the default layout",
            arch
        ),
    }
}
