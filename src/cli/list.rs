use super::programs::SAMPLES;

pub fn cmd_list() {
    for sample in SAMPLES {
        let dims: Vec<String> = sample
            .dims
            .iter()
            .map(|(name, default)| format!("{}={}", name, default))
            .collect();
        println!("{:<6} {}  [{}]", sample.name, sample.about, dims.join(", "));
    }
}
