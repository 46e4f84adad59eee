use colored::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn print_version_info() {
    println!("{} {}", "shmsync".cyan().bold(), VERSION);
    println!("  platform:   {}", shmsync_core::memory::platform_name());
    println!(
        "  shm dir:    {}",
        shmsync_core::memory::shm_base_dir().display()
    );
    println!("  native shm: {}", shmsync_core::memory::has_native_shm());
    println!("  cpus:       {}", num_cpus::get());
}
