fn main() {
    // Emits ESP-IDF link/include arguments for device builds.
    // On host targets no ESP-IDF sysenv exists and this outputs nothing.
    embuild::espidf::sysenv::output();
}
