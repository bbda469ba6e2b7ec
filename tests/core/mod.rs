mod format_output_path;
mod options;
