//! `alterego persona` — Show what the model will be told.

pub async fn run(show_prompt: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let persona = super::load_persona(&config)?;

    println!("{}", persona.diagnostic_summary());
    println!("  Summary file:  {}", config.persona.summary_path.display());
    println!("  Profile file:  {}", config.persona.profile_path.display());

    if show_prompt {
        println!();
        println!("{}", persona.system_prompt());
    }

    Ok(())
}
