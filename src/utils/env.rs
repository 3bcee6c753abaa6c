// Environment variable utils

use std::env;

/// Gets boolean env var
///
/// # Arguments
///
/// * `var_name` - The name of the environment variable
/// * `default_val` - The default value
///
/// # Return value
///
/// Returns true for 'YES' or 'TRUE', false for 'NO' or 'FALSE'
/// (case insensitive). Otherwise, returns the value of default_val
pub fn get_env_bool(var_name: &str, default_val: bool) -> bool {
    match env::var(var_name) {
        Ok(var_str) => {
            if var_str.eq_ignore_ascii_case("YES") || var_str.eq_ignore_ascii_case("TRUE") {
                true
            } else if var_str.eq_ignore_ascii_case("NO") || var_str.eq_ignore_ascii_case("FALSE") {
                false
            } else {
                default_val
            }
        }
        Err(_) => default_val,
    }
}

/// Gets string env var
///
/// # Arguments
///
/// * `var_name` - The name of the environment variable
/// * `default_val` - The default value
///
/// # Return value
///
/// Returns the value of the variable as string or,
/// if not present, the value of default_val
pub fn get_env_string(var_name: &str, default_val: &str) -> String {
    match env::var(var_name) {
        Ok(var_str) => var_str,
        Err(_) => default_val.to_string(),
    }
}

/// Gets u32 env var
///
/// # Arguments
///
/// * `var_name` - The name of the environment variable
/// * `default_val` - The default value
///
/// # Return value
///
/// Returns the value of the variable as u32 or,
/// if not present or invalid, the value of default_val
pub fn get_env_u32(var_name: &str, default_val: u32) -> u32 {
    match env::var(var_name) {
        Ok(var_str) => match var_str.parse() {
            Ok(num) => num,
            Err(_) => default_val,
        },
        Err(_) => default_val,
    }
}
