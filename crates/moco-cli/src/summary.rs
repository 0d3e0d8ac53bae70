use console::Style;
use moco_core::pipeline::MocoConfig;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_run_summary(config: &MocoConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Motion Correction"));
    println!(
        "  {}",
        s.title
            .apply_to("\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}")
    );
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("DWI"),
        s.path.apply_to(config.dwi.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Mask"),
        s.path.apply_to(config.mask.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output_dir.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("b0 cutoff"),
        s.value.apply_to(config.b0_threshold)
    );
    println!();

    println!("  {}", s.header.apply_to("Template"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Transform"),
        s.method.apply_to(config.template.transform)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Iterations"),
        s.value.apply_to(config.template.iterations)
    );
    println!();

    println!("  {}", s.header.apply_to("Model HMC"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Transform"),
        s.method.apply_to(config.hmc.transform)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Iterations"),
        s.value.apply_to(config.hmc.iterations)
    );
    if config.hmc.outlier_threshold > 0.0 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Outliers"),
            s.value
                .apply_to(format!("z > {}", config.hmc.outlier_threshold))
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Outliers"),
            s.disabled.apply_to("disabled")
        );
    }
    println!();
}
