use clap::Parser;
use log::info;
use rwdimage_lib::{process_file, RwdConfig, Viewport};
use std::fs;
use std::path::PathBuf;

const RWDIMAGE_INTRO: &str = r#"
        ____  _       ______     ____
       / __ \| |     / / __ \   /  _/___ ___  ____ _____ ____  _____
      / /_/ /| | /| / / / / /   / // __ `__ \/ __ `/ __ `/ _ \/ ___/
     / _, _/ | |/ |/ / /_/ /  _/ // / / / / / /_/ / /_/ /  __(__  )
    /_/ |_|  |__/|__/_____/  /___/_/ /_/ /_/\__,_/\__, /\___/____/
                                                 /____/
    Responsive images from data-rwdimage directives.
"#;

#[derive(Parser)]
#[command(name = "rwdimage")]
#[command(about = "Compile data-rwdimage directives in an HTML page into CSS")]
struct Args {
    /// Input HTML file.
    input: PathBuf,

    /// Output file: the processed HTML, or the stylesheet with --css-only.
    output: PathBuf,

    /// Viewport width in CSS pixels.
    #[arg(long, default_value_t = 1024.0)]
    width: f64,

    /// Viewport height in CSS pixels.
    #[arg(long, default_value_t = 768.0)]
    height: f64,

    /// Device pixel ratio.
    #[arg(long, default_value_t = 1.0)]
    dpr: f64,

    /// Resolve every image once, without live breakpoint matching.
    #[arg(long)]
    no_live: bool,

    /// Resize the viewport to this width after load; repeatable.
    #[arg(long = "resize", value_name = "W")]
    resizes: Vec<f64>,

    /// Write only the compiled stylesheet.
    #[arg(long)]
    css_only: bool,

    /// Minify the compiled stylesheet.
    #[arg(long)]
    minify: bool,
}

impl Args {
    fn config(&self) -> RwdConfig {
        let viewport = Viewport::new(self.width, self.height).with_pixel_ratio(self.dpr);
        RwdConfig {
            viewport,
            live_matching: !self.no_live,
            resizes: self
                .resizes
                .iter()
                .map(|&width| Viewport { width, ..viewport })
                .collect(),
            minify: self.minify,
            ..RwdConfig::default()
        }
    }
}

fn main() {
    env_logger::init();
    println!("{}", RWDIMAGE_INTRO);

    // parse the args given in terminal
    let args: Args = Args::parse();

    let page = match process_file(&args.input, &args.config()) {
        Ok(page) => page,
        Err(e) => {
            eprintln!("Error processing {}: {}", args.input.display(), e);
            std::process::exit(1);
        }
    };
    println!(
        "Compiled {} images into {} rules.",
        page.registry.len(),
        page.stylesheet.rules.len()
    );

    let contents = if args.css_only { &page.css } else { &page.html };
    if let Err(e) = fs::write(&args.output, contents) {
        eprintln!("Error writing {}: {}", args.output.display(), e);
        std::process::exit(1);
    }
    info!("wrote {}", args.output.display());
}
