use clap::builder::{
	Styles,
	styling::{AnsiColor, Effects},
};

pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Cyan.on_default() | Effects::BOLD | Effects::UNDERLINE)
		.usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.literal(AnsiColor::Yellow.on_default())
		.placeholder(AnsiColor::BrightBlack.on_default() | Effects::ITALIC)
		.error(AnsiColor::Red.on_default() | Effects::BOLD)
		.valid(AnsiColor::Green.on_default())
		.invalid(AnsiColor::Magenta.on_default() | Effects::BOLD)
}

#[cfg(test)]
mod tests {
	#[test]
	fn version_carries_package_version_and_git_sha() {
		let mut parts = super::VERSION.splitn(3, '-');

		assert_eq!(parts.next(), Some(env!("CARGO_PKG_VERSION")));
		assert_eq!(parts.next(), Some(env!("VERGEN_GIT_SHA")));
	}

	#[test]
	fn styles_highlight_errors() {
		let styles = super::styles();

		assert_ne!(styles.get_error(), &clap::builder::styling::Style::new());
		assert_ne!(styles.get_header(), styles.get_usage());
	}
}
